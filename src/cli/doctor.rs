//! `wtx doctor`: check system requirements, per spec §7 Environment errors.

use std::process::Command;

use anyhow::Result;
use clap::Args;

use crate::paths::WtxPaths;

#[derive(Args, Debug)]
pub struct DoctorArgs;

#[allow(clippy::unnecessary_wraps)]
pub fn run(_args: DoctorArgs) -> Result<i32> {
    println!("wtx doctor");
    println!("==========");
    println!();

    let mut all_ok = true;

    all_ok &= check_tool("git", &["--version"], true, "https://git-scm.com/downloads");
    check_tool("gh", &["--version"], false, "https://cli.github.com/");
    all_ok &= check_home();
    all_ok &= check_git_repo();

    println!();
    if all_ok {
        println!("All required checks passed!");
        Ok(0)
    } else {
        println!("Some required checks failed. See above for details.");
        Ok(1)
    }
}

fn check_tool(name: &str, args: &[&str], required: bool, install_url: &str) -> bool {
    let label = if required { "required" } else { "optional" };

    match Command::new(name).args(args).output() {
        Ok(output) if output.status.success() => {
            let version = String::from_utf8_lossy(&output.stdout);
            let version = version.lines().next().unwrap_or("unknown").trim();
            println!("[OK] {name} ({label}): {version}");
            true
        }
        Ok(_) => {
            println!("[FAIL] {name} ({label}): found but returned error");
            println!("       Install: {install_url}");
            !required
        }
        Err(_) => {
            if required {
                println!("[FAIL] {name} ({label}): not found");
                println!("       Install: {install_url}");
                false
            } else {
                println!("[SKIP] {name} ({label}): not found");
                println!("       Install: {install_url}");
                true
            }
        }
    }
}

fn check_home() -> bool {
    match WtxPaths::from_env() {
        Ok(paths) => {
            println!("[OK] HOME is set: state lives under {}", paths.root().display());
            true
        }
        Err(err) => {
            println!("[FAIL] {err}");
            false
        }
    }
}

fn check_git_repo() -> bool {
    match Command::new("git").args(["rev-parse", "--show-toplevel"]).output() {
        Ok(output) if output.status.success() => {
            println!("[OK] git repository: found");
            true
        }
        Ok(output) => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            println!("[WARN] not in a git repository: {}", stderr.lines().next().unwrap_or("unknown error"));
            true
        }
        Err(_) => true,
    }
}
