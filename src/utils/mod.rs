pub mod glob;
pub mod path_validator;
