pub mod extract;
pub mod histocat;
pub mod info;
pub mod stacks;
