use crate::reports::Report;
use anyhow::{anyhow, Context};
use serde::Serialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const MANIFEST_ENTRY: &str = "manifest.json";
const REPORT_ENTRY: &str = "report.json";
pub const BUNDLE_FORMAT_V1: &str = "schoolbook-report-v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Bundle,
}

impl ExportFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "json" => Some(Self::Json),
            "bundle" | "zip" => Some(Self::Bundle),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Bundle => "bundle",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSummary {
    pub path: String,
    pub format: &'static str,
    pub bytes: u64,
    /// Digest of the report document itself, also for bundles.
    pub sha256: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BundleContents {
    pub manifest: Value,
    pub report: Value,
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

fn report_bytes(report: &Report, pretty: bool) -> anyhow::Result<Vec<u8>> {
    let bytes = if pretty {
        serde_json::to_vec_pretty(report)
    } else {
        serde_json::to_vec(report)
    };
    bytes.context("failed to serialize report")
}

fn prepare_dir(out_dir: &Path) -> anyhow::Result<()> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create directory {}", out_dir.to_string_lossy()))
}

/// Writes next to `dst` under a unique name, then renames over it, so a
/// reader never sees a half-written file.
fn write_atomically(dst: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    let dir = dst.parent().unwrap_or_else(|| Path::new("."));
    let tmp = dir.join(format!(".{}.tmp", uuid::Uuid::new_v4()));
    {
        let mut f = File::create(&tmp)
            .with_context(|| format!("failed to create temp file {}", tmp.to_string_lossy()))?;
        f.write_all(bytes)
            .with_context(|| format!("failed to write {}", tmp.to_string_lossy()))?;
        f.flush().context("failed to flush export")?;
    }
    if let Err(e) = std::fs::rename(&tmp, dst) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e)
            .with_context(|| format!("failed to move export to {}", dst.to_string_lossy()));
    }
    Ok(())
}

pub fn export_report_json(
    report: &Report,
    out_dir: &Path,
    pretty: bool,
) -> anyhow::Result<ExportSummary> {
    prepare_dir(out_dir)?;
    let bytes = report_bytes(report, pretty)?;
    let out_path = out_dir.join(report.file_name());
    write_atomically(&out_path, &bytes)?;

    Ok(ExportSummary {
        path: out_path.to_string_lossy().to_string(),
        format: ExportFormat::Json.as_str(),
        bytes: bytes.len() as u64,
        sha256: sha256_hex(&bytes),
    })
}

fn bundle_path(report: &Report, out_dir: &Path) -> PathBuf {
    let name = report.file_name();
    let stem = name.strip_suffix(".json").unwrap_or(&name);
    out_dir.join(format!("{stem}.zip"))
}

pub fn export_report_bundle(
    report: &Report,
    out_dir: &Path,
    pretty: bool,
) -> anyhow::Result<ExportSummary> {
    prepare_dir(out_dir)?;
    let report_json = report_bytes(report, pretty)?;
    let digest = sha256_hex(&report_json);

    let mut buf = std::io::Cursor::new(Vec::new());
    {
        let mut zip = ZipWriter::new(&mut buf);
        let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

        let manifest = json!({
            "format": BUNDLE_FORMAT_V1,
            "version": 1,
            "appVersion": env!("CARGO_PKG_VERSION"),
            "exportedAt": chrono::Utc::now().to_rfc3339(),
            "reportType": report.report_type.as_str(),
            "reportEntry": REPORT_ENTRY,
            "sha256": digest,
        });
        zip.start_file(MANIFEST_ENTRY, opts)
            .context("failed to start manifest entry")?;
        zip.write_all(
            serde_json::to_string_pretty(&manifest)
                .context("failed to serialize manifest")?
                .as_bytes(),
        )
        .context("failed to write manifest entry")?;

        zip.start_file(REPORT_ENTRY, opts)
            .context("failed to start report entry")?;
        zip.write_all(&report_json)
            .context("failed to write report entry")?;

        zip.finish().context("failed to finalize zip bundle")?;
    }

    let bytes = buf.into_inner();
    let out_path = bundle_path(report, out_dir);
    write_atomically(&out_path, &bytes)?;

    Ok(ExportSummary {
        path: out_path.to_string_lossy().to_string(),
        format: ExportFormat::Bundle.as_str(),
        bytes: bytes.len() as u64,
        sha256: digest,
    })
}

pub fn export_report(
    report: &Report,
    out_dir: &Path,
    format: ExportFormat,
    pretty: bool,
) -> anyhow::Result<ExportSummary> {
    let summary = match format {
        ExportFormat::Json => export_report_json(report, out_dir, pretty)?,
        ExportFormat::Bundle => export_report_bundle(report, out_dir, pretty)?,
    };
    tracing::info!(path = %summary.path, bytes = summary.bytes, "report exported");
    Ok(summary)
}

/// Opens a bundle written by [`export_report_bundle`] and checks the report
/// entry against the digest recorded in its manifest.
pub fn read_report_bundle(path: &Path) -> anyhow::Result<BundleContents> {
    let in_file = File::open(path)
        .with_context(|| format!("failed to open bundle {}", path.to_string_lossy()))?;
    let mut archive = ZipArchive::new(in_file).context("invalid zip archive")?;

    let mut manifest_text = String::new();
    archive
        .by_name(MANIFEST_ENTRY)
        .context("bundle missing manifest.json")?
        .read_to_string(&mut manifest_text)
        .context("failed to read manifest.json")?;
    let manifest: Value =
        serde_json::from_str(&manifest_text).context("manifest.json is invalid JSON")?;
    let format = manifest
        .get("format")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    if format != BUNDLE_FORMAT_V1 {
        return Err(anyhow!("unsupported bundle format: {}", format));
    }

    let mut report_bytes = Vec::new();
    archive
        .by_name(REPORT_ENTRY)
        .context("bundle missing report.json")?
        .read_to_end(&mut report_bytes)
        .context("failed to read report.json")?;

    let expected = manifest.get("sha256").and_then(|v| v.as_str()).unwrap_or("");
    let actual = sha256_hex(&report_bytes);
    if expected != actual {
        return Err(anyhow!(
            "checksum mismatch: manifest {} vs report {}",
            expected,
            actual
        ));
    }

    let report: Value =
        serde_json::from_slice(&report_bytes).context("report.json is invalid JSON")?;
    Ok(BundleContents { manifest, report })
}
