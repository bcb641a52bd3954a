pub mod apply;
pub mod pulumi;
