//! Declarative tool files.
//!
//! A manifest is a JSON document holding a tool's descriptor, either flat or
//! under a chat-completion style `function` wrapper, and an `execute` section
//! describing its body.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::expression::{Expr, number_to_json};
use super::{ParamType, Tool, ToolDescriptor, ToolError};

/// The on-disk form of a tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolManifest {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<FunctionSection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execute: Option<ExecuteSpec>,
}

/// The `function` wrapper of the chat-completion tool format.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FunctionSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
}

/// How a manifest tool produces its result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecuteSpec {
    /// Fill `{param}` placeholders in a JSON value
    Template { template: Value },
    /// Evaluate an arithmetic expression over numeric parameters
    Expression { expression: String },
    /// Run an external program with the arguments as JSON on stdin
    Command {
        program: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_secs: Option<u64>,
    },
}

impl ToolManifest {
    /// Parses a manifest from JSON text.
    pub fn parse(path: &Path, text: &str) -> Result<Self, ToolError> {
        serde_json::from_str(text).map_err(|e| ToolError::ModuleLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// The manifest written for a synthesized tool.
    pub fn stub(name: &str) -> Self {
        Self {
            kind: Some("function".to_string()),
            function: Some(FunctionSection {
                name: Some(name.to_string()),
                description: Some(format!("Dynamically generated tool for {}.", name)),
                parameters: Some(serde_json::json!({
                    "type": "object",
                    "properties": {
                        "input": { "type": "string", "description": "Input parameter for the tool." }
                    },
                    "required": ["input"]
                })),
            }),
            execute: Some(ExecuteSpec::Template {
                template: serde_json::json!({
                    "message": format!("Generated tool '{}' executed with input: {{input}}", name)
                }),
            }),
            ..Self::default()
        }
    }

    /// The tool name, looking inside the `function` wrapper first.
    pub fn tool_name(&self) -> Option<&str> {
        self.function
            .as_ref()
            .and_then(|f| f.name.as_deref())
            .or(self.name.as_deref())
    }

    /// Validates the manifest and builds an executable tool from it.
    ///
    /// `workdir` is the directory external programs run in.
    pub fn into_tool(self, path: &Path, workdir: &Path) -> Result<ManifestTool, ToolError> {
        let name = self.tool_name().map(str::to_string).ok_or_else(|| {
            ToolError::schema(&file_label(path), "manifest does not declare a tool name")
        })?;

        let function = self.function.unwrap_or_default();
        let description = function
            .description
            .or(self.description)
            .unwrap_or_default();
        let parameters = function
            .parameters
            .or(self.parameters)
            .ok_or_else(|| ToolError::schema(&name, "manifest does not declare parameters"))?;

        let descriptor = ToolDescriptor::new(name, description, parameters)?;
        let spec = self
            .execute
            .ok_or_else(|| ToolError::schema(&descriptor.name, "manifest has no execute section"))?;
        let executable = Executable::compile(&descriptor, spec)?;

        Ok(ManifestTool {
            descriptor,
            executable,
            workdir: workdir.to_path_buf(),
        })
    }
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// A validated, ready-to-run tool body.
#[derive(Debug, Clone)]
pub enum Executable {
    Template(Value),
    Expression(Expr),
    Command {
        program: String,
        args: Vec<String>,
        timeout: Option<Duration>,
    },
}

impl Executable {
    fn compile(descriptor: &ToolDescriptor, spec: ExecuteSpec) -> Result<Self, ToolError> {
        match spec {
            ExecuteSpec::Template { template } => Ok(Self::Template(template)),
            ExecuteSpec::Expression { expression } => {
                let expr = Expr::parse(&expression)
                    .map_err(|e| ToolError::schema(&descriptor.name, format!("bad expression: {}", e)))?;
                for var in expr.variables() {
                    let spec = descriptor.parameters.param(var).ok_or_else(|| {
                        ToolError::schema(&descriptor.name, format!("expression uses undeclared parameter '{}'", var))
                    })?;
                    if !matches!(spec.kind, ParamType::Number | ParamType::Integer) {
                        return Err(ToolError::schema(
                            &descriptor.name,
                            format!("expression parameter '{}' must be numeric", var),
                        ));
                    }
                    if !descriptor.parameters.is_required(var) {
                        return Err(ToolError::schema(
                            &descriptor.name,
                            format!("expression parameter '{}' must be required", var),
                        ));
                    }
                }
                Ok(Self::Expression(expr))
            }
            ExecuteSpec::Command {
                program,
                args,
                timeout_secs,
            } => {
                if program.trim().is_empty() {
                    return Err(ToolError::schema(&descriptor.name, "command program must not be empty"));
                }
                Ok(Self::Command {
                    program,
                    args,
                    timeout: timeout_secs.map(Duration::from_secs),
                })
            }
        }
    }
}

/// A tool loaded from a manifest file.
#[derive(Debug, Clone)]
pub struct ManifestTool {
    descriptor: ToolDescriptor,
    executable: Executable,
    workdir: PathBuf,
}

impl ManifestTool {
    async fn run_command(
        &self,
        program: &str,
        args: &[String],
        timeout: Option<Duration>,
        input: Map<String, Value>,
    ) -> Result<Value, ToolError> {
        let name = &self.descriptor.name;
        let mut child = Command::new(program)
            .args(args)
            .current_dir(&self.workdir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ToolError::execution(name, format!("failed to start '{}': {}", program, e)))?;

        let payload = serde_json::to_vec(&Value::Object(input))
            .map_err(|e| ToolError::execution(name, e.to_string()))?;
        if let Some(mut stdin) = child.stdin.take() {
            // Programs that ignore their input may exit before reading it.
            if let Err(e) = stdin.write_all(&payload).await {
                if e.kind() != std::io::ErrorKind::BrokenPipe {
                    return Err(ToolError::execution(name, format!("failed to write stdin: {}", e)));
                }
            }
        }

        let output = match timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| ToolError::execution(name, format!("timed out after {:?}", limit)))?,
            None => child.wait_with_output().await,
        }
        .map_err(|e| ToolError::execution(name, e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ToolError::execution(
                name,
                format!("exited with {}: {}", output.status, stderr.trim()),
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stdout = stdout.trim();
        Ok(serde_json::from_str(stdout).unwrap_or_else(|_| Value::String(stdout.to_string())))
    }
}

#[async_trait]
impl Tool for ManifestTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn execute(&self, args: Map<String, Value>) -> Result<Value, ToolError> {
        match &self.executable {
            Executable::Template(template) => Ok(render_template(template, &args)),
            Executable::Expression(expr) => {
                let n = expr
                    .eval(&args)
                    .map_err(|e| ToolError::execution(&self.descriptor.name, e))?;
                Ok(serde_json::json!({ "result": number_to_json(n) }))
            }
            Executable::Command {
                program,
                args: argv,
                timeout,
            } => self.run_command(program, argv, *timeout, args).await,
        }
    }
}

/// Replaces `{param}` placeholders in every string of `template`.
fn render_template(template: &Value, args: &Map<String, Value>) -> Value {
    match template {
        Value::String(s) => {
            let mut out = s.clone();
            for (key, value) in args {
                let placeholder = format!("{{{}}}", key);
                if out.contains(&placeholder) {
                    let text = match value {
                        Value::String(v) => v.clone(),
                        other => other.to_string(),
                    };
                    out = out.replace(&placeholder, &text);
                }
            }
            Value::String(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(|v| render_template(v, args)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), render_template(v, args)))
                .collect(),
        ),
        other => other.clone(),
    }
}
