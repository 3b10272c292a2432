//! Physical device selection policy.
//!
//! Candidate gathering talks to the driver; everything in this module works
//! on plain data so the selection rules can be tested without a GPU.

use bitflags::bitflags;
use thiserror::Error;

bitflags! {
    /// Queue capabilities a family can offer.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct QueueCaps: u8 {
        /// Graphics command submission.
        const GRAPHICS = 1 << 0;
        /// Presentation to the target surface.
        const PRESENT = 1 << 1;
        /// Compute dispatch.
        const COMPUTE = 1 << 2;
        /// Transfer operations.
        const TRANSFER = 1 << 3;
    }
}

/// One queue family as reported by the driver.
#[derive(Debug, Clone, Copy)]
pub struct QueueFamilyInfo {
    /// Capabilities of this family, including per-surface present support.
    pub caps: QueueCaps,
    /// Number of queues the family exposes.
    pub queue_count: u32,
}

/// What a device must offer to be accepted.
#[derive(Debug, Clone)]
pub struct DeviceRequirements {
    /// Queue capabilities that must each resolve to a family index.
    pub queues: QueueCaps,
    /// Device extensions that must be present.
    pub extensions: Vec<String>,
    /// Require anisotropic sampling support.
    pub sampler_anisotropy: bool,
    /// Reject integrated GPUs.
    pub discrete_gpu: bool,
}

impl Default for DeviceRequirements {
    fn default() -> Self {
        Self {
            // Compute is assigned when available but never required.
            queues: QueueCaps::GRAPHICS | QueueCaps::PRESENT | QueueCaps::TRANSFER,
            extensions: vec![String::from("VK_KHR_swapchain")],
            sampler_anisotropy: true,
            discrete_gpu: false,
        }
    }
}

/// Everything selection needs to know about one physical device.
#[derive(Debug, Clone)]
pub struct DeviceCandidate {
    /// Device name, for logging.
    pub name: String,
    /// Whether the device is a discrete GPU.
    pub discrete: bool,
    /// Queue families in driver order.
    pub queue_families: Vec<QueueFamilyInfo>,
    /// Supported device extension names.
    pub extensions: Vec<String>,
    /// Surface formats available against the target surface.
    pub surface_format_count: u32,
    /// Present modes available against the target surface.
    pub present_mode_count: u32,
    /// Whether the device supports anisotropic sampling.
    pub sampler_anisotropy: bool,
}

/// Queue family assignments resolved for one device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    /// Family used for graphics submission.
    pub graphics: Option<u32>,
    /// Family used for presentation.
    pub present: Option<u32>,
    /// Family used for compute dispatch.
    pub compute: Option<u32>,
    /// Family used for transfer operations.
    pub transfer: Option<u32>,
}

impl QueueFamilyIndices {
    fn missing(&self, required: QueueCaps) -> QueueCaps {
        let mut missing = QueueCaps::empty();
        if required.contains(QueueCaps::GRAPHICS) && self.graphics.is_none() {
            missing |= QueueCaps::GRAPHICS;
        }
        if required.contains(QueueCaps::PRESENT) && self.present.is_none() {
            missing |= QueueCaps::PRESENT;
        }
        if required.contains(QueueCaps::COMPUTE) && self.compute.is_none() {
            missing |= QueueCaps::COMPUTE;
        }
        if required.contains(QueueCaps::TRANSFER) && self.transfer.is_none() {
            missing |= QueueCaps::TRANSFER;
        }
        missing
    }
}

/// Why a candidate was passed over.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Rejection {
    /// A discrete GPU was required and this device is not one.
    #[error("not a discrete GPU")]
    NotDiscrete,
    /// One or more required queue capabilities had no family.
    #[error("missing queue support: {0:?}")]
    MissingQueues(QueueCaps),
    /// The surface reports no formats for this device.
    #[error("no surface formats")]
    NoSurfaceFormats,
    /// The surface reports no present modes for this device.
    #[error("no present modes")]
    NoPresentModes,
    /// A required device extension is absent.
    #[error("missing device extension {0}")]
    MissingExtension(String),
    /// Anisotropic sampling was required and is unsupported.
    #[error("no sampler anisotropy support")]
    NoSamplerAnisotropy,
}

/// Assign queue family indices in a single pass over `families`.
///
/// Graphics and compute stick to the first family offering them. Transfer
/// prefers the family whose flags carry the fewest graphics/compute bits,
/// which favours a dedicated transfer queue; equal scores keep the earlier
/// index. Present support is taken from the first supporting family.
pub fn assign_queue_families(families: &[QueueFamilyInfo]) -> QueueFamilyIndices {
    let mut indices = QueueFamilyIndices::default();
    let mut min_transfer_score = u8::MAX;

    for (index, family) in families.iter().enumerate() {
        let index = index as u32;
        let mut transfer_score = 0u8;

        if family.caps.contains(QueueCaps::GRAPHICS) {
            if indices.graphics.is_none() {
                indices.graphics = Some(index);
            }
            transfer_score += 1;
        }

        if family.caps.contains(QueueCaps::COMPUTE) {
            if indices.compute.is_none() {
                indices.compute = Some(index);
            }
            transfer_score += 1;
        }

        if family.caps.contains(QueueCaps::TRANSFER) && transfer_score < min_transfer_score {
            min_transfer_score = transfer_score;
            indices.transfer = Some(index);
        }

        if family.caps.contains(QueueCaps::PRESENT) && indices.present.is_none() {
            indices.present = Some(index);
        }
    }

    indices
}

/// Test one candidate against the requirements.
pub fn meets_requirements(
    candidate: &DeviceCandidate,
    requirements: &DeviceRequirements,
) -> Result<QueueFamilyIndices, Rejection> {
    if requirements.discrete_gpu && !candidate.discrete {
        return Err(Rejection::NotDiscrete);
    }

    let indices = assign_queue_families(&candidate.queue_families);
    let missing = indices.missing(requirements.queues);
    if !missing.is_empty() {
        return Err(Rejection::MissingQueues(missing));
    }

    if candidate.surface_format_count == 0 {
        return Err(Rejection::NoSurfaceFormats);
    }
    if candidate.present_mode_count == 0 {
        return Err(Rejection::NoPresentModes);
    }

    for extension in &requirements.extensions {
        if !candidate.extensions.iter().any(|have| have == extension) {
            return Err(Rejection::MissingExtension(extension.clone()));
        }
    }

    if requirements.sampler_anisotropy && !candidate.sampler_anisotropy {
        return Err(Rejection::NoSamplerAnisotropy);
    }

    Ok(indices)
}

/// First-fit selection over `candidates` in enumeration order.
pub fn select_device(
    candidates: &[DeviceCandidate],
    requirements: &DeviceRequirements,
) -> Option<(usize, QueueFamilyIndices)> {
    for (position, candidate) in candidates.iter().enumerate() {
        match meets_requirements(candidate, requirements) {
            Ok(indices) => {
                log::info!("Selected GPU: {}", candidate.name);
                return Some((position, indices));
            }
            Err(rejection) => {
                log::info!("Skipping GPU {}: {}", candidate.name, rejection);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(caps: QueueCaps) -> QueueFamilyInfo {
        QueueFamilyInfo {
            caps,
            queue_count: 1,
        }
    }

    fn qualifying(name: &str) -> DeviceCandidate {
        DeviceCandidate {
            name: name.to_string(),
            discrete: true,
            queue_families: vec![family(QueueCaps::all())],
            extensions: vec![String::from("VK_KHR_swapchain")],
            surface_format_count: 4,
            present_mode_count: 2,
            sampler_anisotropy: true,
        }
    }

    #[test]
    fn graphics_and_compute_stick_to_first_offering_family() {
        let indices = assign_queue_families(&[
            family(QueueCaps::TRANSFER),
            family(QueueCaps::GRAPHICS | QueueCaps::COMPUTE | QueueCaps::TRANSFER),
            family(QueueCaps::GRAPHICS | QueueCaps::COMPUTE),
        ]);
        assert_eq!(indices.graphics, Some(1));
        assert_eq!(indices.compute, Some(1));
    }

    #[test]
    fn transfer_prefers_dedicated_family() {
        let indices = assign_queue_families(&[
            family(QueueCaps::GRAPHICS | QueueCaps::COMPUTE | QueueCaps::TRANSFER),
            family(QueueCaps::COMPUTE | QueueCaps::TRANSFER),
            family(QueueCaps::TRANSFER),
        ]);
        assert_eq!(indices.transfer, Some(2));
    }

    #[test]
    fn transfer_ties_keep_the_earlier_family() {
        let indices = assign_queue_families(&[
            family(QueueCaps::GRAPHICS | QueueCaps::TRANSFER),
            family(QueueCaps::TRANSFER),
            family(QueueCaps::TRANSFER),
        ]);
        assert_eq!(indices.transfer, Some(1));
    }

    #[test]
    fn present_takes_first_supporting_family() {
        let indices = assign_queue_families(&[
            family(QueueCaps::GRAPHICS | QueueCaps::TRANSFER),
            family(QueueCaps::PRESENT),
            family(QueueCaps::PRESENT | QueueCaps::GRAPHICS),
        ]);
        assert_eq!(indices.present, Some(1));
    }

    #[test]
    fn empty_family_list_resolves_nothing() {
        assert_eq!(assign_queue_families(&[]), QueueFamilyIndices::default());
    }

    #[test]
    fn default_requirements_do_not_demand_compute() {
        let mut candidate = qualifying("igpu");
        candidate.queue_families = vec![family(
            QueueCaps::GRAPHICS | QueueCaps::PRESENT | QueueCaps::TRANSFER,
        )];

        let indices =
            meets_requirements(&candidate, &DeviceRequirements::default()).unwrap();
        assert_eq!(indices.compute, None);
        assert_eq!(indices.graphics, Some(0));
    }

    #[test]
    fn missing_queues_name_the_gap() {
        let mut candidate = qualifying("no-transfer");
        candidate.queue_families = vec![family(QueueCaps::GRAPHICS | QueueCaps::PRESENT)];

        assert_eq!(
            meets_requirements(&candidate, &DeviceRequirements::default()),
            Err(Rejection::MissingQueues(QueueCaps::TRANSFER))
        );
    }

    #[test]
    fn discrete_preference_rejects_integrated() {
        let mut candidate = qualifying("integrated");
        candidate.discrete = false;

        let requirements = DeviceRequirements {
            discrete_gpu: true,
            ..DeviceRequirements::default()
        };
        assert_eq!(
            meets_requirements(&candidate, &requirements),
            Err(Rejection::NotDiscrete)
        );
        assert!(meets_requirements(&candidate, &DeviceRequirements::default()).is_ok());
    }

    #[test]
    fn swapchain_support_is_required() {
        let mut no_formats = qualifying("no-formats");
        no_formats.surface_format_count = 0;
        assert_eq!(
            meets_requirements(&no_formats, &DeviceRequirements::default()),
            Err(Rejection::NoSurfaceFormats)
        );

        let mut no_modes = qualifying("no-modes");
        no_modes.present_mode_count = 0;
        assert_eq!(
            meets_requirements(&no_modes, &DeviceRequirements::default()),
            Err(Rejection::NoPresentModes)
        );
    }

    #[test]
    fn missing_extension_is_rejected() {
        let mut candidate = qualifying("bare");
        candidate.extensions.clear();

        assert_eq!(
            meets_requirements(&candidate, &DeviceRequirements::default()),
            Err(Rejection::MissingExtension(String::from("VK_KHR_swapchain")))
        );
    }

    #[test]
    fn anisotropy_is_required_by_default() {
        let mut candidate = qualifying("no-aniso");
        candidate.sampler_anisotropy = false;

        assert_eq!(
            meets_requirements(&candidate, &DeviceRequirements::default()),
            Err(Rejection::NoSamplerAnisotropy)
        );
    }

    #[test]
    fn sole_qualifying_device_wins_regardless_of_position() {
        let mut weak = qualifying("weak");
        weak.surface_format_count = 0;

        let candidates = vec![weak.clone(), weak, qualifying("strong")];
        let (position, indices) =
            select_device(&candidates, &DeviceRequirements::default()).unwrap();
        assert_eq!(position, 2);
        assert_eq!(indices.graphics, Some(0));
    }

    #[test]
    fn selection_is_first_fit_not_best_fit() {
        // The second device is "better" (more formats) but enumeration
        // order decides.
        let first = qualifying("first");
        let mut second = qualifying("second");
        second.surface_format_count = 64;

        let (position, _) =
            select_device(&[first, second], &DeviceRequirements::default()).unwrap();
        assert_eq!(position, 0);
    }

    #[test]
    fn zero_qualifying_devices_select_nothing() {
        let mut candidate = qualifying("unfit");
        candidate.extensions.clear();

        assert_eq!(
            select_device(&[candidate], &DeviceRequirements::default()),
            None
        );
        assert_eq!(select_device(&[], &DeviceRequirements::default()), None);
    }
}
