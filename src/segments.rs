//! Body segments, tissue layers and the node layout of the thermal network
//!
//! The body is divided into 17 segments. Every segment has a core and a skin
//! layer; head and pelvis additionally carry muscle and fat layers. Node 0 is
//! the central blood pool that all tissue nodes exchange heat with through
//! blood flow.

use serde::{Deserialize, Serialize};

/// Number of body segments
pub const SEGMENT_COUNT: usize = 17;

/// Index of the central blood pool node
pub const POOL_NODE: usize = 0;

/// Body segment, in the fixed order used by every per-segment array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Segment {
    Head,
    Neck,
    Chest,
    Back,
    Pelvis,
    LeftShoulder,
    LeftArm,
    LeftHand,
    RightShoulder,
    RightArm,
    RightHand,
    LeftThigh,
    LeftLeg,
    LeftFoot,
    RightThigh,
    RightLeg,
    RightFoot,
}

impl Segment {
    /// All segments in array order
    pub const ALL: [Segment; SEGMENT_COUNT] = [
        Segment::Head,
        Segment::Neck,
        Segment::Chest,
        Segment::Back,
        Segment::Pelvis,
        Segment::LeftShoulder,
        Segment::LeftArm,
        Segment::LeftHand,
        Segment::RightShoulder,
        Segment::RightArm,
        Segment::RightHand,
        Segment::LeftThigh,
        Segment::LeftLeg,
        Segment::LeftFoot,
        Segment::RightThigh,
        Segment::RightLeg,
        Segment::RightFoot,
    ];

    /// Position of this segment in per-segment arrays
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Segment::Head => "head",
            Segment::Neck => "neck",
            Segment::Chest => "chest",
            Segment::Back => "back",
            Segment::Pelvis => "pelvis",
            Segment::LeftShoulder => "left_shoulder",
            Segment::LeftArm => "left_arm",
            Segment::LeftHand => "left_hand",
            Segment::RightShoulder => "right_shoulder",
            Segment::RightArm => "right_arm",
            Segment::RightHand => "right_hand",
            Segment::LeftThigh => "left_thigh",
            Segment::LeftLeg => "left_leg",
            Segment::LeftFoot => "left_foot",
            Segment::RightThigh => "right_thigh",
            Segment::RightLeg => "right_leg",
            Segment::RightFoot => "right_foot",
        }
    }

    /// Whether the segment carries separate muscle and fat layers
    pub fn has_muscle_and_fat(self) -> bool {
        matches!(self, Segment::Head | Segment::Pelvis)
    }

    pub fn is_hand(self) -> bool {
        matches!(self, Segment::LeftHand | Segment::RightHand)
    }

    pub fn is_foot(self) -> bool {
        matches!(self, Segment::LeftFoot | Segment::RightFoot)
    }
}

/// Tissue layer, ordered innermost to outermost
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layer {
    Core,
    Muscle,
    Fat,
    Skin,
}

/// Mapping from (segment, layer) to node index in the temperature vector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeMap {
    core: [usize; SEGMENT_COUNT],
    muscle: [Option<usize>; SEGMENT_COUNT],
    fat: [Option<usize>; SEGMENT_COUNT],
    skin: [usize; SEGMENT_COUNT],
    len: usize,
}

impl Default for NodeMap {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeMap {
    /// Lay out nodes as: pool, then per segment core, [muscle, fat,] skin
    pub fn new() -> Self {
        let mut core = [0; SEGMENT_COUNT];
        let mut muscle = [None; SEGMENT_COUNT];
        let mut fat = [None; SEGMENT_COUNT];
        let mut skin = [0; SEGMENT_COUNT];

        let mut next = POOL_NODE + 1;
        for seg in Segment::ALL {
            let i = seg.index();
            core[i] = next;
            next += 1;
            if seg.has_muscle_and_fat() {
                muscle[i] = Some(next);
                fat[i] = Some(next + 1);
                next += 2;
            }
            skin[i] = next;
            next += 1;
        }

        Self {
            core,
            muscle,
            fat,
            skin,
            len: next,
        }
    }

    /// Total number of nodes including the blood pool
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn core(&self, seg: Segment) -> usize {
        self.core[seg.index()]
    }

    pub fn skin(&self, seg: Segment) -> usize {
        self.skin[seg.index()]
    }

    pub fn muscle(&self, seg: Segment) -> Option<usize> {
        self.muscle[seg.index()]
    }

    pub fn fat(&self, seg: Segment) -> Option<usize> {
        self.fat[seg.index()]
    }

    /// Node of a given layer, `None` when the segment lacks that layer
    pub fn node(&self, seg: Segment, layer: Layer) -> Option<usize> {
        match layer {
            Layer::Core => Some(self.core(seg)),
            Layer::Muscle => self.muscle(seg),
            Layer::Fat => self.fat(seg),
            Layer::Skin => Some(self.skin(seg)),
        }
    }

    /// Present layers of a segment, innermost first
    pub fn chain(&self, seg: Segment) -> Vec<usize> {
        [Layer::Core, Layer::Muscle, Layer::Fat, Layer::Skin]
            .iter()
            .filter_map(|&layer| self.node(seg, layer))
            .collect()
    }
}
