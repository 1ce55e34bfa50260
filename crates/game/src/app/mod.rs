pub(crate) mod bootstrap;
mod demo_scene;
pub(crate) mod loop_runner;
mod save;
mod trace;
