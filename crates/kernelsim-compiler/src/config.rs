//! Pipeline configuration.

use crate::pass::PassKind;
use crate::pass_manager::PassManager;
use crate::passes::{DEFAULT_UNROLL_FACTOR, LoopUnrollingPass, MemoryMapPass, TensorFusionPass};
use kernelsim_core::Result;

/// Which passes run, in what order, and how they are parametrized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Passes in execution order. Repeats are allowed.
    pub passes: Vec<PassKind>,

    /// Unroll factor handed to every loop unrolling pass.
    pub unroll_factor: usize,

    /// Record before/after snapshots around each pass.
    pub emit_ir: bool,

    /// Reject unrecognized dtypes during memory mapping.
    pub strict_dtypes: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            passes: PassKind::ALL.to_vec(),
            unroll_factor: DEFAULT_UNROLL_FACTOR,
            emit_ir: false,
            strict_dtypes: false,
        }
    }
}

impl PipelineConfig {
    /// Build a pass manager with the configured passes registered.
    ///
    /// # Errors
    ///
    /// Returns `InvalidUnrollFactor` if a loop unrolling pass is requested
    /// with a zero factor.
    pub fn build(&self) -> Result<PassManager> {
        let mut manager = PassManager::new().with_emit_ir(self.emit_ir);

        for kind in &self.passes {
            match kind {
                PassKind::LoopUnroll => {
                    manager.add_pass(LoopUnrollingPass::new(self.unroll_factor)?);
                }
                PassKind::Fusion => {
                    manager.add_pass(TensorFusionPass::new());
                }
                PassKind::MemoryMap => {
                    manager.add_pass(
                        MemoryMapPass::new().with_strict_dtypes(self.strict_dtypes),
                    );
                }
            }
        }

        Ok(manager)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernelsim_core::Error;

    #[test]
    fn test_default_pipeline() {
        let manager = PipelineConfig::default().build().unwrap();
        let kinds: Vec<PassKind> = manager.passes().iter().map(|p| p.kind()).collect();
        assert_eq!(
            kinds,
            vec![PassKind::LoopUnroll, PassKind::Fusion, PassKind::MemoryMap]
        );
    }

    #[test]
    fn test_custom_order_and_repeats() {
        let config = PipelineConfig {
            passes: vec![PassKind::MemoryMap, PassKind::Fusion, PassKind::Fusion],
            ..Default::default()
        };
        let manager = config.build().unwrap();
        let names: Vec<&str> = manager.passes().iter().map(|p| p.name()).collect();
        assert_eq!(
            names,
            vec!["MemoryMapPass", "TensorFusionPass", "TensorFusionPass"]
        );
    }

    #[test]
    fn test_zero_unroll_factor_rejected() {
        let config = PipelineConfig {
            unroll_factor: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.build(),
            Err(Error::InvalidUnrollFactor(0))
        ));
    }

    #[test]
    fn test_zero_factor_ignored_without_unrolling() {
        let config = PipelineConfig {
            passes: vec![PassKind::MemoryMap],
            unroll_factor: 0,
            ..Default::default()
        };
        assert!(config.build().is_ok());
    }

    #[test]
    fn test_strict_dtypes_reach_memory_map() {
        let config = PipelineConfig {
            passes: vec![PassKind::MemoryMap],
            strict_dtypes: true,
            ..Default::default()
        };
        let mut manager = config.build().unwrap();
        let mut graph = kernelsim_core::IrGraph::new();
        graph.add_tensor("t", &[2], "int8").unwrap();

        assert!(matches!(
            manager.run(&mut graph),
            Err(Error::UnknownDType { .. })
        ));
    }
}
