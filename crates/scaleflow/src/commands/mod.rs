pub mod apply;
pub mod destroy;
pub mod plan;
pub mod status;
pub mod validate;
