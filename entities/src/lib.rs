pub mod prelude;

pub mod game;
pub mod string_list;
pub mod sync_progress;
