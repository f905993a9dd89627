//! Open a URL in the system default browser.
//!
//! WSL is detected so the consent page opens in the Windows-side browser.

use std::process::Command;

/// True when running under Windows Subsystem for Linux.
#[cfg(target_os = "linux")]
fn is_wsl() -> bool {
    std::fs::read_to_string("/proc/version")
        .map(|version| {
            let version = version.to_lowercase();
            version.contains("microsoft") || version.contains("wsl")
        })
        .unwrap_or(false)
}

/// Open `url` in the default browser. Returns whether a launcher started;
/// the caller prints the URL for manual use when it did not.
pub fn open(url: &str) -> bool {
    #[cfg(target_os = "windows")]
    {
        Command::new("cmd")
            .args(["/c", "start", "", url])
            .spawn()
            .is_ok()
    }

    #[cfg(target_os = "macos")]
    {
        Command::new("open").arg(url).spawn().is_ok()
    }

    #[cfg(target_os = "linux")]
    {
        if is_wsl() {
            // wslview comes with wslu; cmd.exe is the fallback. current_dir
            // avoids the UNC working-directory warning.
            Command::new("wslview").arg(url).spawn().is_ok()
                || Command::new("cmd.exe")
                    .current_dir("/mnt/c/")
                    .args(["/c", "start", "", url])
                    .stderr(std::process::Stdio::null())
                    .spawn()
                    .is_ok()
        } else {
            Command::new("xdg-open").arg(url).spawn().is_ok()
        }
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
    {
        false
    }
}
