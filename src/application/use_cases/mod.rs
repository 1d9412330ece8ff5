pub mod operate_catalog;
pub mod select_files;
