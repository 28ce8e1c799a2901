// Vulkan rendering components

pub mod commands;
pub mod render_pass;
pub mod shader;
pub mod vertex_layout;
pub mod command_recorder;

pub use commands::*;
pub use render_pass::*;
pub use shader::*;
pub use vertex_layout::*;
pub use command_recorder::*;
