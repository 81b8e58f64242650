use crate::config::loader::MockaConfig;
use crate::toolchain::adapter::Toolchain;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct RustcToolchain {
    compiler: String,
    edition: String,
    extra_args: Vec<String>,
}

impl RustcToolchain {
    pub fn from_config(config: &MockaConfig) -> Self {
        Self {
            compiler: config.compiler.clone(),
            edition: config.edition.clone(),
            extra_args: config.extra_args.clone(),
        }
    }
}

impl Toolchain for RustcToolchain {
    fn name(&self) -> &'static str {
        "rustc"
    }

    fn source_file_name(&self) -> &'static str {
        "main.rs"
    }

    fn compile_command(&self, source: &Path, output: &Path) -> Vec<String> {
        let mut command = vec![
            self.compiler.clone(),
            "--edition".to_string(),
            self.edition.clone(),
            "--crate-name".to_string(),
            "mocka".to_string(),
        ];
        command.extend(self.extra_args.iter().cloned());
        command.push("-o".to_string());
        command.push(output.to_string_lossy().to_string());
        command.push(source.to_string_lossy().to_string());
        command
    }
}
