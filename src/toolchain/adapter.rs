use std::path::Path;

/// Toolchain contract for turning a rendered source file into an executable.
pub trait Toolchain: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &'static str;
    /// File name the rendered source is written to inside a build workspace.
    fn source_file_name(&self) -> &'static str;
    /// Full argv, program first, that compiles `source` into `output`.
    fn compile_command(&self, source: &Path, output: &Path) -> Vec<String>;
}
