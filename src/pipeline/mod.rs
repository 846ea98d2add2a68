pub mod archive;
pub mod discovery;
pub mod extraction;
pub mod output;
pub mod prompt;
pub mod runner;
pub mod workdir;
