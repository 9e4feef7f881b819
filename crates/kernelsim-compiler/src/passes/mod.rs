//! Graph transformation passes.

mod loop_unrolling;
mod memory_map;
mod tensor_fusion;

pub use loop_unrolling::{DEFAULT_UNROLL_FACTOR, LoopUnrollingPass};
pub use memory_map::{ALIGNMENT, MEMORY_OFFSET_ATTR, MEMORY_SIZE_ATTR, MemoryMapPass};
pub use tensor_fusion::{FUSED_OPS_ATTR, TensorFusionPass};
