//! Body geometry and passive thermal properties
//!
//! Standard-body tables (surface area, heat capacities, conductances, basal
//! blood flows and basal metabolism) are scaled to an individual body. The
//! resulting [`SegmentParameters`] is immutable and shared read-only by every
//! state built from it.

use crate::error::ComputeError;
use crate::segments::{NodeMap, Segment, POOL_NODE, SEGMENT_COUNT};
use crate::types::{Anthropometrics, BmrEquation, BsaEquation, Sex};
use serde::{Deserialize, Serialize};

type PerSegment = [f64; SEGMENT_COUNT];

/// Standard body weight (kg)
pub const STANDARD_WEIGHT: f64 = 74.43;

/// Standard body basal cardiac output (L/h)
pub const STANDARD_BLOOD_FLOW: f64 = 290.0;

/// Volumetric heat capacity of blood (Wh/(L·K)); flow in L/h times this gives W/K
pub const BLOOD_HEAT_CAPACITY: f64 = 1.067;

/// Lower bound on basal metabolic rate (W)
pub const MIN_BMR: f64 = 68.0;

/// Standard-body segment surface areas (m²)
pub const STANDARD_BSA: PerSegment = [
    0.110, 0.029, 0.175, 0.161, 0.221, 0.096, 0.063, 0.050, 0.096, 0.063, 0.050, 0.209, 0.112,
    0.056, 0.209, 0.112, 0.056,
];

// Heat capacities (Wh/K)
const CAP_ARTERY: PerSegment = [
    0.096, 0.025, 0.12, 0.111, 0.265, 0.0186, 0.0091, 0.0044, 0.0186, 0.0091, 0.0044, 0.0813,
    0.04, 0.0103, 0.0813, 0.04, 0.0103,
];
const CAP_VEIN: PerSegment = [
    0.321, 0.085, 0.424, 0.39, 0.832, 0.046, 0.024, 0.01, 0.046, 0.024, 0.01, 0.207, 0.1, 0.024,
    0.207, 0.1, 0.024,
];
const CAP_SUPERFICIAL_VEIN: PerSegment = [
    0.0, 0.0, 0.0, 0.0, 0.0, 0.025, 0.015, 0.011, 0.025, 0.015, 0.011, 0.074, 0.05, 0.021, 0.074,
    0.05, 0.021,
];
const CAP_CENTRAL_BLOOD: f64 = 1.999;
const CAP_CORE: PerSegment = [
    1.7229, 0.564, 10.2975, 9.3935, 4.488, 1.6994, 1.1209, 0.1536, 1.6994, 1.1209, 0.1536,
    5.3117, 2.867, 0.2097, 5.3117, 2.867, 0.2097,
];
const CAP_MUSCLE: PerSegment = [
    0.305, 0.0, 0.0, 0.0, 7.409, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
];
const CAP_FAT: PerSegment = [
    0.203, 0.0, 0.0, 0.0, 1.947, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
];
const CAP_SKIN: PerSegment = [
    0.1885, 0.058, 0.441, 0.406, 0.556, 0.126, 0.084, 0.088, 0.126, 0.084, 0.088, 0.334, 0.169,
    0.107, 0.334, 0.169, 0.107,
];

// Core to skin conductance (W/K) by body fat class, upper bounds in percent
const CORE_SKIN_BY_FAT: [(f64, PerSegment); 5] = [
    (
        12.5,
        [
            1.341, 0.930, 1.879, 1.729, 2.370, 1.557, 1.018, 2.210, 1.557, 1.018, 2.210, 2.565,
            1.378, 3.404, 2.565, 1.378, 3.404,
        ],
    ),
    (
        17.5,
        [
            1.311, 0.909, 1.785, 1.643, 2.251, 1.501, 0.982, 2.183, 1.501, 0.982, 2.183, 2.468,
            1.326, 3.370, 2.468, 1.326, 3.370,
        ],
    ),
    (
        22.5,
        [
            1.282, 0.889, 1.698, 1.563, 2.142, 1.448, 0.947, 2.156, 1.448, 0.947, 2.156, 2.375,
            1.276, 3.337, 2.375, 1.276, 3.337,
        ],
    ),
    (
        27.5,
        [
            1.255, 0.870, 1.618, 1.488, 2.040, 1.396, 0.913, 2.130, 1.396, 0.913, 2.130, 2.285,
            1.227, 3.304, 2.285, 1.227, 3.304,
        ],
    ),
    (
        f64::INFINITY,
        [
            1.227, 0.852, 1.542, 1.419, 1.945, 1.346, 0.880, 1.945, 1.346, 0.880, 1.945, 2.198,
            1.181, 3.271, 2.198, 1.181, 3.271,
        ],
    ),
];

// Head and pelvis layer conductances (W/K): core-muscle, muscle-fat, fat-skin
const HEAD_LAYERS: [f64; 3] = [1.601, 13.222, 16.008];
const PELVIS_LAYERS: [f64; 3] = [3.0813, 10.3738, 41.4954];

// Basal blood flows (L/h)
const BASAL_FLOW_CORE: PerSegment = [
    35.251, 15.240, 89.214, 87.663, 18.686, 1.808, 0.940, 0.217, 1.808, 0.940, 0.217, 1.406,
    0.164, 0.080, 1.406, 0.164, 0.080,
];
const BASAL_FLOW_MUSCLE: PerSegment = [
    0.682, 0.0, 0.0, 0.0, 12.614, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
];
const BASAL_FLOW_FAT: PerSegment = [
    0.265, 0.0, 0.0, 0.0, 2.219, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
];
const BASAL_FLOW_SKIN: PerSegment = [
    1.754, 0.325, 1.967, 1.475, 2.272, 0.91, 0.508, 1.114, 0.91, 0.508, 1.114, 1.456, 0.651,
    0.934, 1.456, 0.651, 0.934,
];

// Share of BMR produced in each layer
const BMR_SHARE_CORE: PerSegment = [
    0.19551, 0.00324, 0.28689, 0.25677, 0.09509, 0.01435, 0.00409, 0.00106, 0.01435, 0.00409,
    0.00106, 0.01557, 0.00422, 0.00250, 0.01557, 0.00422, 0.00250,
];
const BMR_SHARE_MUSCLE: PerSegment = [
    0.00252, 0.0, 0.0, 0.0, 0.04804, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
];
const BMR_SHARE_FAT: PerSegment = [
    0.00127, 0.0, 0.0, 0.0, 0.00950, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
];
const BMR_SHARE_SKIN: PerSegment = [
    0.00152, 0.00033, 0.00211, 0.00187, 0.00300, 0.00059, 0.00031, 0.00059, 0.00059, 0.00031,
    0.00059, 0.00144, 0.00027, 0.00118, 0.00144, 0.00027, 0.00118,
];

/// Thermal conductance between two nodes (W/K)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub a: usize,
    pub b: usize,
    pub conductance: f64,
}

/// Per-segment quantities for one tissue layer, zero where the layer is absent
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LayerValues {
    pub core: PerSegment,
    pub muscle: PerSegment,
    pub fat: PerSegment,
    pub skin: PerSegment,
}

/// Passive properties of an individual body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentParameters {
    pub anthropometrics: Anthropometrics,
    pub nodes: NodeMap,
    /// Segment surface areas (m²)
    pub bsa: PerSegment,
    /// Whole-body surface area (m²)
    pub total_bsa: f64,
    /// Body surface area relative to the standard body
    pub bsa_ratio: f64,
    /// Weight relative to the standard body
    pub weight_ratio: f64,
    /// Basal cardiac output relative to the standard body
    pub blood_flow_ratio: f64,
    /// Segment masses (kg)
    pub mass: PerSegment,
    /// Basal metabolic rate (W)
    pub bmr: f64,
    /// Basal heat production per layer (W)
    pub basal_heat: LayerValues,
    /// Basal blood flow per layer (L/h)
    pub basal_flow: LayerValues,
    /// Heat capacity per node (J/K)
    pub capacity: Vec<f64>,
    /// Conductive links between adjacent layers
    pub links: Vec<Link>,
}

impl SegmentParameters {
    /// Scale the standard body to the given anthropometrics
    pub fn from_anthropometrics(body: &Anthropometrics) -> Result<Self, ComputeError> {
        body.validate()?;

        let total_bsa = body_surface_area(body.height, body.weight, body.bsa_equation);
        let bsa_ratio = total_bsa / STANDARD_BSA.iter().sum::<f64>();
        let weight_ratio = body.weight / STANDARD_WEIGHT;
        let blood_flow_ratio = blood_flow_ratio(body.age, body.cardiac_index, bsa_ratio);

        let bsa = STANDARD_BSA.map(|a| a * bsa_ratio);

        let bmr = match body.bmr_override {
            Some(bmr) => bmr,
            None => basal_metabolic_rate(body),
        };

        let nodes = NodeMap::new();
        let mut capacity = vec![0.0; nodes.len()];
        let blood_wh = CAP_CENTRAL_BLOOD
            + CAP_ARTERY.iter().sum::<f64>()
            + CAP_VEIN.iter().sum::<f64>()
            + CAP_SUPERFICIAL_VEIN.iter().sum::<f64>();
        capacity[POOL_NODE] = blood_wh * blood_flow_ratio * 3600.0;

        let mut tissue_capacity = [0.0; SEGMENT_COUNT];
        for seg in Segment::ALL {
            let i = seg.index();
            capacity[nodes.core(seg)] = CAP_CORE[i] * weight_ratio * 3600.0;
            capacity[nodes.skin(seg)] = CAP_SKIN[i] * weight_ratio * 3600.0;
            if let Some(m) = nodes.muscle(seg) {
                capacity[m] = CAP_MUSCLE[i] * weight_ratio * 3600.0;
            }
            if let Some(f) = nodes.fat(seg) {
                capacity[f] = CAP_FAT[i] * weight_ratio * 3600.0;
            }
            tissue_capacity[i] = CAP_CORE[i] + CAP_MUSCLE[i] + CAP_FAT[i] + CAP_SKIN[i];
        }

        let tissue_total: f64 = tissue_capacity.iter().sum();
        let mass = tissue_capacity.map(|c| body.weight * c / tissue_total);

        let links = conduction_links(&nodes, body.body_fat, bsa_ratio, weight_ratio);

        let basal_heat = LayerValues {
            core: BMR_SHARE_CORE.map(|s| s * bmr),
            muscle: BMR_SHARE_MUSCLE.map(|s| s * bmr),
            fat: BMR_SHARE_FAT.map(|s| s * bmr),
            skin: BMR_SHARE_SKIN.map(|s| s * bmr),
        };

        let basal_flow = LayerValues {
            core: BASAL_FLOW_CORE.map(|f| f * blood_flow_ratio),
            muscle: BASAL_FLOW_MUSCLE.map(|f| f * blood_flow_ratio),
            fat: BASAL_FLOW_FAT.map(|f| f * blood_flow_ratio),
            skin: BASAL_FLOW_SKIN.map(|f| f * blood_flow_ratio),
        };

        Ok(Self {
            anthropometrics: body.clone(),
            nodes,
            bsa,
            total_bsa,
            bsa_ratio,
            weight_ratio,
            blood_flow_ratio,
            mass,
            bmr,
            basal_heat,
            basal_flow,
            capacity,
            links,
        })
    }

    /// Total heat capacity of the core layers (J/K)
    pub fn core_capacity(&self) -> f64 {
        Segment::ALL
            .iter()
            .map(|&seg| self.capacity[self.nodes.core(seg)])
            .sum()
    }

    pub fn sex(&self) -> Sex {
        self.anthropometrics.sex
    }

    pub fn age(&self) -> f64 {
        self.anthropometrics.age
    }
}

/// Body surface area (m²) for height in m and weight in kg
pub fn body_surface_area(height: f64, weight: f64, equation: BsaEquation) -> f64 {
    match equation {
        BsaEquation::Dubois => 0.202 * weight.powf(0.425) * height.powf(0.725),
        BsaEquation::Takahira => 0.2042 * weight.powf(0.425) * height.powf(0.725),
        BsaEquation::Fujimoto => 0.1882 * weight.powf(0.444) * height.powf(0.663),
        BsaEquation::Kurazumi => 0.2440 * weight.powf(0.383) * height.powf(0.693),
    }
}

/// Basal metabolic rate (W), floored at [`MIN_BMR`]
pub fn basal_metabolic_rate(body: &Anthropometrics) -> f64 {
    let (w, h, age) = (body.weight, body.height, body.age);
    let kcal_per_day = match (body.bmr_equation, body.sex) {
        (BmrEquation::HarrisBenedict, Sex::Male) => 88.362 + 13.397 * w + 500.3 * h - 5.677 * age,
        (BmrEquation::HarrisBenedict, Sex::Female) => {
            447.593 + 9.247 * w + 479.9 * h - 4.330 * age
        }
        (BmrEquation::HarrisBenedictOriginal, Sex::Male) => {
            66.4730 + 13.7516 * w + 500.33 * h - 6.7550 * age
        }
        (BmrEquation::HarrisBenedictOriginal, Sex::Female) => {
            655.0955 + 9.5634 * w + 184.96 * h - 4.6756 * age
        }
        (BmrEquation::Japanese, sex) => {
            let offset = match sex {
                Sex::Male => 0.4235,
                Sex::Female => 0.9708,
            };
            (0.0481 * w + 2.34 * h - 0.0138 * age - offset) * 1000.0 / 4.186
        }
    };
    (kcal_per_day * 0.048).max(MIN_BMR)
}

fn blood_flow_ratio(age: f64, cardiac_index: f64, bsa_ratio: f64) -> f64 {
    let age_factor = if age < 50.0 {
        1.0
    } else if age < 60.0 {
        0.85
    } else if age < 70.0 {
        0.75
    } else {
        0.7
    };
    let cardiac_output = cardiac_index * 60.0 * age_factor * bsa_ratio * STANDARD_BSA.iter().sum::<f64>();
    cardiac_output / STANDARD_BLOOD_FLOW
}

fn conduction_links(
    nodes: &NodeMap,
    body_fat: f64,
    bsa_ratio: f64,
    weight_ratio: f64,
) -> Vec<Link> {
    let fat_percent = body_fat * 100.0;
    let core_skin = CORE_SKIN_BY_FAT
        .iter()
        .find(|(upper, _)| fat_percent < *upper)
        .map(|(_, table)| *table)
        .unwrap_or(CORE_SKIN_BY_FAT[4].1);

    let mut links = Vec::with_capacity(SEGMENT_COUNT + 4);
    for seg in Segment::ALL {
        let i = seg.index();
        // Head and neck scale as spheres, the rest as cylinders
        let scale = if i < 2 {
            weight_ratio / bsa_ratio
        } else {
            bsa_ratio * bsa_ratio / weight_ratio
        };

        let layers = match seg {
            Segment::Head => Some(HEAD_LAYERS),
            Segment::Pelvis => Some(PELVIS_LAYERS),
            _ => None,
        };
        let chain = nodes.chain(seg);
        match layers {
            Some(values) if chain.len() == 4 => {
                for (k, g) in values.iter().enumerate() {
                    links.push(Link {
                        a: chain[k],
                        b: chain[k + 1],
                        conductance: g * scale,
                    });
                }
            }
            _ => links.push(Link {
                a: nodes.core(seg),
                b: nodes.skin(seg),
                conductance: core_skin[i] * scale,
            }),
        }
    }
    links
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_params() -> SegmentParameters {
        SegmentParameters::from_anthropometrics(&Anthropometrics::new(1.7, 60.0, 30.0, Sex::Male))
            .unwrap()
    }

    #[test]
    fn test_bsa_sums_to_total() {
        let params = make_params();
        let sum: f64 = params.bsa.iter().sum();
        assert!((sum - params.total_bsa).abs() < 1e-9);
    }

    #[test]
    fn test_mass_sums_to_weight() {
        let params = make_params();
        let sum: f64 = params.mass.iter().sum();
        assert!((sum - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_standard_body_ratios() {
        let params = SegmentParameters::from_anthropometrics(&Anthropometrics::default()).unwrap();
        assert!((params.weight_ratio - 1.0).abs() < 1e-12);
        // DuBois for the standard body is close to the tabulated 1.87 m²
        assert!((params.bsa_ratio - 1.0).abs() < 0.01);
        assert!((params.blood_flow_ratio - 1.0).abs() < 0.02);
    }

    #[test]
    fn test_bmr_equations() {
        let body = Anthropometrics::default();
        let bmr = basal_metabolic_rate(&body);
        assert!(bmr > 80.0 && bmr < 100.0);

        let tiny = Anthropometrics::new(0.6, 20.0, 90.0, Sex::Female);
        assert!((basal_metabolic_rate(&tiny) - MIN_BMR).abs() < 1e-12);

        let override_body = Anthropometrics::default().with_bmr(75.0);
        let params = SegmentParameters::from_anthropometrics(&override_body).unwrap();
        assert!((params.bmr - 75.0).abs() < 1e-12);
    }

    #[test]
    fn test_layer_links() {
        let params = make_params();
        assert_eq!(params.links.len(), 15 + 2 * 3);
        assert!(params.links.iter().all(|l| l.conductance > 0.0));
        assert!(params.capacity.iter().all(|&c| c > 0.0));
    }

    #[test]
    fn test_fat_class_lowers_conductance() {
        let lean = Anthropometrics::default().with_body_fat(0.10);
        let heavy = Anthropometrics::default().with_body_fat(0.30);
        let lean = SegmentParameters::from_anthropometrics(&lean).unwrap();
        let heavy = SegmentParameters::from_anthropometrics(&heavy).unwrap();
        let chest = |p: &SegmentParameters| {
            p.links
                .iter()
                .find(|l| l.a == p.nodes.core(Segment::Chest))
                .map(|l| l.conductance)
                .unwrap()
        };
        assert!(chest(&lean) > chest(&heavy));
    }

    #[test]
    fn test_invalid_body_rejected() {
        let body = Anthropometrics::new(1.7, 10.0, 30.0, Sex::Male);
        assert!(SegmentParameters::from_anthropometrics(&body).is_err());
    }
}
