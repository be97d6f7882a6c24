//! Run command implementation.
//!
//! Loads a policy file, evaluates every record of one OTLP export request,
//! drops rejected records, prunes scope and resource containers left empty,
//! and writes the surviving request back out in the input's format.

use std::fs;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::ValueEnum;
use opentelemetry_proto::tonic::collector::logs::v1::ExportLogsServiceRequest;
use opentelemetry_proto::tonic::collector::metrics::v1::ExportMetricsServiceRequest;
use opentelemetry_proto::tonic::collector::trace::v1::ExportTraceServiceRequest;
use prost::Message;
use tracing::info;
use triage_engine::{FileProvider, PolicyEngine, PolicyRegistry};
use triage_otlp::{LogAccessor, MetricAccessor, SpanAccessor};

/// Signal carried by the input payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SignalArg {
    Log,
    Metric,
    Trace,
}

/// Wire format of the input payload, kept for the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PayloadFormat {
    Json,
    Protobuf,
}

fn sniff(data: &[u8]) -> PayloadFormat {
    match data.iter().find(|byte| !byte.is_ascii_whitespace()) {
        Some(b'{') => PayloadFormat::Json,
        _ => PayloadFormat::Protobuf,
    }
}

/// Runs the run command.
pub fn run(
    policies_path: &str,
    input_path: &str,
    output_path: &str,
    signal: SignalArg,
    stats_path: Option<&str>,
) -> Result<()> {
    let registry = Arc::new(PolicyRegistry::new());
    registry
        .reload(&FileProvider::new(policies_path))
        .with_context(|| format!("Failed to load policies: {policies_path}"))?;
    info!(
        policies = registry.snapshot().len(),
        "Loaded policy snapshot"
    );
    let engine = PolicyEngine::new(Arc::clone(&registry));

    let input = fs::read(input_path)
        .with_context(|| format!("Failed to read input file: {input_path}"))?;
    let format = sniff(&input);

    let output = match signal {
        SignalArg::Log => process_logs(&engine, &input, format)?,
        SignalArg::Metric => process_metrics(&engine, &input, format)?,
        SignalArg::Trace => process_traces(&engine, &input, format)?,
    };

    fs::write(output_path, output)
        .with_context(|| format!("Failed to write output file: {output_path}"))?;
    info!("Filtered request written to: {}", output_path);

    if let Some(stats_path) = stats_path {
        let report = registry.collect_stats().active_only();
        let data = serde_json::to_vec(&report).context("Failed to serialize stats")?;
        fs::write(stats_path, data)
            .with_context(|| format!("Failed to write stats file: {stats_path}"))?;
        info!("Match stats written to: {}", stats_path);
    }

    Ok(())
}

fn process_logs(engine: &PolicyEngine, input: &[u8], format: PayloadFormat) -> Result<Vec<u8>> {
    let mut request: ExportLogsServiceRequest = match format {
        PayloadFormat::Json => {
            serde_json::from_slice(input).context("Failed to decode OTLP/JSON logs")?
        }
        PayloadFormat::Protobuf => ExportLogsServiceRequest::decode(input)
            .context("Failed to decode OTLP protobuf logs")?,
    };

    for resource_logs in &mut request.resource_logs {
        let resource_schema = resource_logs.schema_url.clone();
        let resource = &mut resource_logs.resource;
        for scope_logs in &mut resource_logs.scope_logs {
            let scope_schema = scope_logs.schema_url.clone();
            let scope = &mut scope_logs.scope;
            let mut kept = Vec::with_capacity(scope_logs.log_records.len());
            for record in &mut scope_logs.log_records {
                let mut accessor = LogAccessor::new(record)
                    .with_resource(resource.as_mut(), &resource_schema)
                    .with_scope(scope.as_mut(), &scope_schema);
                kept.push(!engine.evaluate_log(&mut accessor).is_drop());
            }
            let mut keep = kept.into_iter();
            scope_logs.log_records.retain(|_| keep.next().unwrap_or(true));
        }
        resource_logs
            .scope_logs
            .retain(|scope_logs| !scope_logs.log_records.is_empty());
    }
    request
        .resource_logs
        .retain(|resource_logs| !resource_logs.scope_logs.is_empty());

    encode_logs(&request, format)
}

fn encode_logs(request: &ExportLogsServiceRequest, format: PayloadFormat) -> Result<Vec<u8>> {
    match format {
        PayloadFormat::Json => {
            serde_json::to_vec(request).context("Failed to encode OTLP/JSON logs")
        }
        PayloadFormat::Protobuf => Ok(request.encode_to_vec()),
    }
}

fn process_metrics(engine: &PolicyEngine, input: &[u8], format: PayloadFormat) -> Result<Vec<u8>> {
    let mut request: ExportMetricsServiceRequest = match format {
        PayloadFormat::Json => {
            serde_json::from_slice(input).context("Failed to decode OTLP/JSON metrics")?
        }
        PayloadFormat::Protobuf => ExportMetricsServiceRequest::decode(input)
            .context("Failed to decode OTLP protobuf metrics")?,
    };

    for resource_metrics in &mut request.resource_metrics {
        let resource_schema = resource_metrics.schema_url.clone();
        let resource = &mut resource_metrics.resource;
        for scope_metrics in &mut resource_metrics.scope_metrics {
            let scope_schema = scope_metrics.schema_url.clone();
            let scope = &mut scope_metrics.scope;
            let mut kept = Vec::with_capacity(scope_metrics.metrics.len());
            for metric in &mut scope_metrics.metrics {
                let mut accessor = MetricAccessor::new(metric)
                    .with_resource(resource.as_mut(), &resource_schema)
                    .with_scope(scope.as_mut(), &scope_schema);
                kept.push(!engine.evaluate_metric(&mut accessor).is_drop());
            }
            let mut keep = kept.into_iter();
            scope_metrics.metrics.retain(|_| keep.next().unwrap_or(true));
        }
        resource_metrics
            .scope_metrics
            .retain(|scope_metrics| !scope_metrics.metrics.is_empty());
    }
    request
        .resource_metrics
        .retain(|resource_metrics| !resource_metrics.scope_metrics.is_empty());

    match format {
        PayloadFormat::Json => {
            serde_json::to_vec(&request).context("Failed to encode OTLP/JSON metrics")
        }
        PayloadFormat::Protobuf => Ok(request.encode_to_vec()),
    }
}

fn process_traces(engine: &PolicyEngine, input: &[u8], format: PayloadFormat) -> Result<Vec<u8>> {
    let mut request: ExportTraceServiceRequest = match format {
        PayloadFormat::Json => {
            serde_json::from_slice(input).context("Failed to decode OTLP/JSON traces")?
        }
        PayloadFormat::Protobuf => ExportTraceServiceRequest::decode(input)
            .context("Failed to decode OTLP protobuf traces")?,
    };

    for resource_spans in &mut request.resource_spans {
        let resource_schema = resource_spans.schema_url.clone();
        let resource = &mut resource_spans.resource;
        for scope_spans in &mut resource_spans.scope_spans {
            let scope_schema = scope_spans.schema_url.clone();
            let scope = &mut scope_spans.scope;
            let mut kept = Vec::with_capacity(scope_spans.spans.len());
            for span in &mut scope_spans.spans {
                let mut accessor = SpanAccessor::new(span)
                    .with_resource(resource.as_mut(), &resource_schema)
                    .with_scope(scope.as_mut(), &scope_schema);
                kept.push(!engine.evaluate_trace(&mut accessor).is_drop());
            }
            let mut keep = kept.into_iter();
            scope_spans.spans.retain(|_| keep.next().unwrap_or(true));
        }
        resource_spans
            .scope_spans
            .retain(|scope_spans| !scope_spans.spans.is_empty());
    }
    request
        .resource_spans
        .retain(|resource_spans| !resource_spans.scope_spans.is_empty());

    match format {
        PayloadFormat::Json => {
            serde_json::to_vec(&request).context("Failed to encode OTLP/JSON traces")
        }
        PayloadFormat::Protobuf => Ok(request.encode_to_vec()),
    }
}
