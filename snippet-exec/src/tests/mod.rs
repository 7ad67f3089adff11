mod supervision;
mod utils;
