//! UIコンポーネント

pub mod header;
pub mod upload_form;
pub mod camera_panel;
pub mod result_panel;
