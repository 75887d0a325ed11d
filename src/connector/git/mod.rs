mod cli_view;

pub use cli_view::GitCliView;
