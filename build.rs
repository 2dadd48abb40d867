use std::process::Command;

fn timestamp(format: &str) -> String {
	let output = Command::new("date")
		.arg(format)
		.output()
		.expect("Failed to run date");
	String::from_utf8_lossy(&output.stdout).trim().to_string()
}

fn main() {
	println!("cargo:rustc-env=COMPILE_DATE={}", timestamp("+%Y-%m-%d"));
	println!("cargo:rustc-env=COMPILE_TIME={}", timestamp("+%H:%M:%S"));
}
