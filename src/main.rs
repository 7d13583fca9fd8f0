#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

fn main() {
    campaign_command_center_lib::run();
}
