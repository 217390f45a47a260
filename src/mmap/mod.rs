/*!
 * Memory-Mapped File Manager
 * Per-process registries of page-granular file mappings
 */

pub mod manager;
pub mod types;

pub use manager::{Mapping, MappingRegistry};
pub use types::{MappingInfo, MmapError, MmapResult};
