//! # corowave
//!
//! Suspendability analysis for JVM coroutine instrumentation. Classifies
//! every method of a dynamically-discovered class universe as suspendable or
//! not, so a downstream bytecode-rewriting pass can transform call chains
//! reaching a suspending operation into continuation-based form while leaving
//! ordinary calls untouched.
//!
//! ## Architecture
//!
//! - **suspend**: suspend-type classification enum with config mnemonics
//! - **entry**: per-class metadata records and method keys
//! - **db**: concurrent metadata store, superclass index, and work list
//! - **classify**: hierarchy-walking suspendability resolution
//! - **hierarchy**: common-superclass and exception-ancestry queries
//! - **classfile**: JVM class-file decoder producing metadata records
//! - **classpath**: class byte lookup across directories and jars
//! - **scan**: class-file discovery and the incremental scan coordinator
//! - **config**: behavior toggles and the external suspend-rules file
//! - **diag**: leveled diagnostics capability injected into the database

pub mod classfile;
pub mod classify;
pub mod classpath;
pub mod cli;
pub mod config;
pub mod db;
pub mod diag;
pub mod entry;
pub mod hierarchy;
pub mod scan;
pub mod suspend;
