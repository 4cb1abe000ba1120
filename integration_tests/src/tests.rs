//! Integration test cases.

use anyhow::{bail, Result};
use colored::Colorize;

use crate::device::DeviceClient;

/// Outcome of one test case.
pub struct TestResult {
    pub name: &'static str,
    pub error: Option<String>,
}

impl TestResult {
    pub fn passed(&self) -> bool {
        self.error.is_none()
    }
}

type TestFn = fn(&mut DeviceClient) -> Result<()>;

/// Shell cases, run in order against one device
const TESTS: &[(&str, TestFn)] = &[
    ("help lists the commands", test_help),
    ("Unknown command is rejected", test_unknown_command),
    ("nustest count limit is enforced", test_count_limit),
    ("nustest size limit is enforced", test_size_limit),
    ("bleuarttx without a peer", test_tx_not_connected),
    ("nustest without a peer", test_nustest_not_connected),
    ("bleuartrx with nothing pending", test_rx_empty),
];

/// Run all tests, printing each outcome as it happens.
pub fn run_all_tests(device: &mut DeviceClient) -> Vec<TestResult> {
    TESTS
        .iter()
        .map(|&(name, test)| {
            print!("  {} ... ", name);
            std::io::Write::flush(&mut std::io::stdout()).ok();

            // Start each test from a quiet console
            let _ = device.drain_buffer();

            let error = test(device).err().map(|e| e.to_string());
            match &error {
                None => println!("{}", "PASS".green().bold()),
                Some(msg) => {
                    println!("{}", "FAIL".red().bold());
                    println!("    {}", msg.red());
                }
            }
            TestResult { name, error }
        })
        .collect()
}

/// Print test results summary.
pub fn print_results(results: &[TestResult]) {
    println!("\n{}", "=".repeat(60));
    println!("{}", "Test Results".bold());
    println!("{}", "=".repeat(60));

    let mut passed = 0;
    let mut failed = 0;

    for result in results {
        match &result.error {
            None => {
                println!("  {} {}", "[PASS]".green().bold(), result.name);
                passed += 1;
            }
            Some(msg) => {
                println!("  {} {}", "[FAIL]".red().bold(), result.name);
                println!("         {}", msg.red());
                failed += 1;
            }
        }
    }

    println!("{}", "-".repeat(60));
    println!(
        "  Total: {} passed, {} failed",
        passed.to_string().green(),
        if failed > 0 {
            failed.to_string().red()
        } else {
            failed.to_string().normal()
        }
    );
    println!("{}", "=".repeat(60));
}

/// Send `line` and wait for output containing `expected`
fn expect_output(device: &mut DeviceClient, line: &str, expected: &str) -> Result<()> {
    device.command(line, expected)?;
    Ok(())
}

// --- Individual Tests ---

fn test_help(device: &mut DeviceClient) -> Result<()> {
    let output = device.command("help", "help")?;
    for name in ["bleuarttx", "bleuartrx", "nustest"] {
        if !output.contains(name) {
            bail!("help does not mention {}", name);
        }
    }
    Ok(())
}

fn test_unknown_command(device: &mut DeviceClient) -> Result<()> {
    expect_output(device, "frobnicate", "error: unknown command")
}

fn test_count_limit(device: &mut DeviceClient) -> Result<()> {
    expect_output(device, "nustest 101 20", "error: count must not exceed 100")
}

fn test_size_limit(device: &mut DeviceClient) -> Result<()> {
    expect_output(device, "nustest 10 241", "error: size must not exceed 240")
}

fn test_tx_not_connected(device: &mut DeviceClient) -> Result<()> {
    expect_output(device, "bleuarttx hello", "not connected")
}

fn test_nustest_not_connected(device: &mut DeviceClient) -> Result<()> {
    let output = device.command("nustest 10 20", "Submitted")?;
    if !output.contains("Submitted 200 bytes (10 packets of 20 size), 0 accepted") {
        bail!("Unexpected report: {:?}", output);
    }
    Ok(())
}

fn test_rx_empty(device: &mut DeviceClient) -> Result<()> {
    device.set_timeout(std::time::Duration::from_millis(500));
    let result = device.command("bleuartrx", "\n");
    device.set_timeout(std::time::Duration::from_secs(2));
    result.map(|_| ())
}
