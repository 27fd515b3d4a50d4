//! Energy-balance assembly for one backward Euler step
//!
//! Each node i satisfies
//!
//! ```text
//! C_i (T'_i - T_i) / dt = Σ_j G_ij (T'_j - T'_i) + B_i (T'_pool - T'_i)
//!                         + H_i (T_o,i - T'_i) + Q_i
//! ```
//!
//! where `G` are conductive links between adjacent layers, `B` the blood
//! advection to the central pool, `H` the dry conductance of skin to the
//! environment and `Q` the net heat source, including any external heat. The pool closes the circulation, so
//! the matrix is symmetric and internal exchanges cancel in the energy sum.

use crate::controller::ControlSignals;
use crate::geometry::{SegmentParameters, BLOOD_HEAT_CAPACITY};
use crate::heat_transfer::TransferCoefficients;
use crate::metabolism::MetabolicState;
use crate::segments::{Layer, Segment, POOL_NODE};
use crate::types::{ExternalHeat, HeatBalance};

/// Dense system `matrix · T' = rhs`
#[derive(Debug, Clone, PartialEq)]
pub struct LinearSystem {
    pub matrix: Vec<Vec<f64>>,
    pub rhs: Vec<f64>,
}

impl LinearSystem {
    fn zeros(n: usize) -> Self {
        Self {
            matrix: vec![vec![0.0; n]; n],
            rhs: vec![0.0; n],
        }
    }

    fn couple(&mut self, a: usize, b: usize, conductance: f64) {
        self.matrix[a][a] += conductance;
        self.matrix[b][b] += conductance;
        self.matrix[a][b] -= conductance;
        self.matrix[b][a] -= conductance;
    }
}

pub struct Assembler;

impl Assembler {
    #[allow(clippy::too_many_arguments)]
    pub fn assemble(
        params: &SegmentParameters,
        coefficients: &TransferCoefficients,
        metabolic: &MetabolicState,
        signals: &ControlSignals,
        respiratory_loss: f64,
        external: &ExternalHeat,
        temperatures: &[f64],
        dt: f64,
    ) -> LinearSystem {
        let nodes = &params.nodes;
        let mut system = LinearSystem::zeros(nodes.len());

        for (i, &c) in params.capacity.iter().enumerate() {
            system.matrix[i][i] += c / dt;
            system.rhs[i] += c / dt * temperatures[i];
        }

        for link in &params.links {
            system.couple(link.a, link.b, link.conductance);
        }

        for seg in Segment::ALL {
            let i = seg.index();
            let layers = [
                (Layer::Core, metabolic.heat.core[i], metabolic.flow.core[i]),
                (Layer::Muscle, metabolic.heat.muscle[i], metabolic.flow.muscle[i]),
                (Layer::Fat, metabolic.heat.fat[i], metabolic.flow.fat[i]),
                (Layer::Skin, metabolic.heat.skin[i], metabolic.flow.skin[i]),
            ];
            for (layer, heat, flow) in layers {
                if let Some(node) = nodes.node(seg, layer) {
                    system.couple(node, POOL_NODE, BLOOD_HEAT_CAPACITY * flow);
                    system.rhs[node] += heat + external.at(seg, layer);
                }
            }

            let skin = nodes.skin(seg);
            let h = coefficients.dry_conductance[i];
            system.matrix[skin][skin] += h;
            system.rhs[skin] += h * coefficients.operative[i] - signals.evaporation[i];
        }

        system.rhs[POOL_NODE] += external.blood;
        system.rhs[nodes.core(Segment::Chest)] -= respiratory_loss;
        system
    }

    /// Energy bookkeeping of a solved step (J)
    #[allow(clippy::too_many_arguments)]
    pub fn heat_balance(
        params: &SegmentParameters,
        coefficients: &TransferCoefficients,
        metabolic: &MetabolicState,
        signals: &ControlSignals,
        respiratory_loss: f64,
        external: &ExternalHeat,
        before: &[f64],
        after: &[f64],
        dt: f64,
    ) -> HeatBalance {
        let stored = params
            .capacity
            .iter()
            .zip(before.iter().zip(after.iter()))
            .map(|(c, (t0, t1))| c * (t1 - t0))
            .sum();

        let sensible: f64 = Segment::ALL
            .iter()
            .map(|&seg| {
                let i = seg.index();
                coefficients.dry_conductance[i]
                    * (after[params.nodes.skin(seg)] - coefficients.operative[i])
            })
            .sum();

        HeatBalance {
            stored,
            production: metabolic.total_heat() * dt,
            sensible: sensible * dt,
            evaporative: signals.evaporation.iter().sum::<f64>() * dt,
            respiratory: respiratory_loss * dt,
            external: external.total() * dt,
        }
    }
}
