//! 持久化端口的参考实现
//!
//! 真实部署中分析存储由外部适配器提供，这里的实现用于单机运行和测试。

pub mod dead_letter;
pub mod jsonl;
pub mod memory;

pub use dead_letter::{FileDeadLetter, LoggingDeadLetter};
pub use jsonl::JsonLinesSink;
pub use memory::{MemoryDeadLetter, MemorySink};
