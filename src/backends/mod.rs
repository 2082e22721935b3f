// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Task implementations shipped with the engine.
//!
//! # Local Backend
//! In-process tasks operating on pooled buffers:
//! - **Sources**: `generate` (indexed frames), [`local::MemorySource`] (caller data)
//! - **Transforms**: `stack`, `slice`, `scale`
//! - **Sinks**: `null`, [`local::MemorySink`] (collects into memory)
//!
//! Type-named tasks are created through [`local::LocalTaskFactory`], which the
//! default [`crate::config::TaskRegistry`] wraps. A remote daemon resolves the
//! task types it is asked to run through the same registry.
//!
//! # Examples
//!
//! ```rust
//! use dataflow_engine::backends::local::LocalTaskFactory;
//!
//! let task = LocalTaskFactory::create_task("scale")?;
//! assert_eq!(task.type_name(), "scale");
//! # Ok::<(), dataflow_engine::errors::ConfigurationError>(())
//! ```

pub mod local;
