pub mod controls;
pub mod datatable;
pub mod debug;
pub mod figure;
pub mod filters;
pub mod metrics;
pub mod text_input;
