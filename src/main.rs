// Built for the GUI subsystem so double-clicking never flashes a console.
// Batch runs from a terminal borrow the parent's console instead.
#![windows_subsystem = "windows"]

use easystencil::app::StencilApp;
use easystencil::{cli, logger};
use eframe::egui;

/// Route stdout/stderr to the terminal that launched a batch run.
#[cfg(target_os = "windows")]
fn attach_parent_console() {
    unsafe extern "system" {
        fn AttachConsole(process_id: u32) -> i32;
        fn SetStdHandle(std_handle: u32, handle: isize) -> i32;
        fn CreateFileW(
            file_name: *const u16,
            desired_access: u32,
            share_mode: u32,
            security_attributes: *const std::ffi::c_void,
            creation_disposition: u32,
            flags_and_attributes: u32,
            template_file: isize,
        ) -> isize;
    }
    const PARENT_PROCESS: u32 = u32::MAX;
    const GENERIC_WRITE: u32 = 0x4000_0000;
    const SHARE_READ_WRITE: u32 = 0x3;
    const OPEN_EXISTING: u32 = 3;
    const STDOUT: u32 = -11i32 as u32;
    const STDERR: u32 = -12i32 as u32;

    let console: Vec<u16> = "CONOUT$".encode_utf16().chain(Some(0)).collect();
    // SAFETY: plain Win32 calls; `console` is NUL-terminated and outlives the call.
    unsafe {
        if AttachConsole(PARENT_PROCESS) == 0 {
            return;
        }
        let handle = CreateFileW(
            console.as_ptr(),
            GENERIC_WRITE,
            SHARE_READ_WRITE,
            std::ptr::null(),
            OPEN_EXISTING,
            0,
            0,
        );
        if handle != -1 {
            SetStdHandle(STDOUT, handle);
            SetStdHandle(STDERR, handle);
        }
    }
}

fn main() -> Result<(), eframe::Error> {
    #[cfg(target_os = "windows")]
    if cli::CliArgs::is_cli_mode() {
        attach_parent_console();
    }

    // One log per launch.
    logger::init();

    if cli::CliArgs::is_cli_mode() {
        use clap::Parser;
        let args = cli::CliArgs::parse();
        let code = cli::run(args);
        std::process::exit(if code == std::process::ExitCode::SUCCESS {
            0
        } else {
            1
        });
    }

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 800.0])
            .with_min_inner_size([900.0, 600.0])
            .with_title("EasyStencil")
            .with_drag_and_drop(true),
        ..Default::default()
    };

    eframe::run_native(
        "EasyStencil",
        options,
        Box::new(|cc| Box::new(StencilApp::new(cc))),
    )
}
