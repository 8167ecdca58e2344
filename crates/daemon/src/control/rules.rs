// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Rule directory listing and file-level validation.
//!
//! Rule *content* semantics belong to the engine; validation here is the
//! cheap structural pass the control plane can answer synchronously:
//! readable files, rule-shaped lines, per-line diagnostics.

use serde::Serialize;
use std::io;
use std::path::Path;

/// Actions a rule line may start with.
const RULE_ACTIONS: [&str; 5] = ["alert", "drop", "pass", "reject", "rejectboth"];

#[derive(Debug, Clone, Serialize)]
pub struct RuleFile {
    pub name: String,
    pub size_bytes: u64,
    pub rules: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RulesSummary {
    pub dir: String,
    pub files: Vec<RuleFile>,
    pub total_rules: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RuleDiagnostic {
    pub file: String,
    pub line: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub dir: String,
    pub files_checked: usize,
    pub rules_checked: usize,
    pub errors: Vec<RuleDiagnostic>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Enumerate `*.rules` files with their rule counts.
pub fn list_rules(dir: &Path) -> io::Result<RulesSummary> {
    let mut files = Vec::new();
    let mut total_rules = 0;
    for name in rule_file_names(dir)? {
        let path = dir.join(&name);
        let size_bytes = std::fs::metadata(&path)?.len();
        let text = std::fs::read_to_string(&path)?;
        let rules = text.lines().filter(|line| is_rule_line(line)).count();
        total_rules += rules;
        files.push(RuleFile { name, size_bytes, rules });
    }
    Ok(RulesSummary { dir: dir.display().to_string(), files, total_rules })
}

/// Structural validation of every rule file in the directory.
pub fn validate_rules(dir: &Path) -> io::Result<ValidationReport> {
    let mut report = ValidationReport {
        dir: dir.display().to_string(),
        files_checked: 0,
        rules_checked: 0,
        errors: Vec::new(),
    };

    for name in rule_file_names(dir)? {
        report.files_checked += 1;
        let text = std::fs::read_to_string(dir.join(&name))?;
        for (idx, line) in text.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            report.rules_checked += 1;
            if let Some(reason) = check_rule_line(trimmed) {
                report.errors.push(RuleDiagnostic { file: name.clone(), line: idx + 1, reason });
            }
        }
    }
    Ok(report)
}

fn rule_file_names(dir: &Path) -> io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.ends_with(".rules") && entry.file_type()?.is_file() {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

fn is_rule_line(line: &str) -> bool {
    let trimmed = line.trim();
    !trimmed.is_empty() && !trimmed.starts_with('#')
}

/// `None` when the line is rule-shaped, otherwise the reason it is not.
fn check_rule_line(line: &str) -> Option<String> {
    let action = line.split_whitespace().next().unwrap_or("");
    if !RULE_ACTIONS.contains(&action) {
        return Some(format!("unknown action '{action}'"));
    }
    let open = match line.find('(') {
        Some(open) => open,
        None => return Some("missing option block".to_string()),
    };
    let close = match line.rfind(')') {
        Some(close) if close > open => close,
        _ => return Some("unterminated option block".to_string()),
    };
    let options = &line[open + 1..close];
    if !options.contains("sid:") {
        return Some("missing sid option".to_string());
    }
    None
}
