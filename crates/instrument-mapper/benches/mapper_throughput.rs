//! Throughput of the read/convert/forward loop.

use criterion::{BatchSize, BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use instrument_mapper::mock::{
    MemoryDiagnosticSink, MockControllerSink, MockDevicePort, passthrough_converter,
};
use instrument_mapper::prelude::*;
use std::hint::black_box;
use std::sync::Arc;

const READ_LENGTH: usize = 27;

fn scripted_mapper(reports: usize) -> MapperThread<MockDevicePort, MockControllerSink> {
    let mut script = vec![vec![0x10; READ_LENGTH]; reports.saturating_sub(1)];
    script.push(vec![0x02; READ_LENGTH]);

    let device = MockDevicePort::new(READ_LENGTH).with_reads(script);
    let sink = MockControllerSink::new(device.journal());
    MapperThread::new(device, sink).with_diagnostics(Arc::new(MemoryDiagnosticSink::new()))
}

fn run_to_sentinel(
    mut mapper: MapperThread<MockDevicePort, MockControllerSink>,
) -> MapperResult<u64> {
    mapper.start()?;
    let forwarded = mapper.wait()?.map_or(0, |run| run.reports_forwarded);
    Ok(forwarded)
}

fn bench_run_to_sentinel(c: &mut Criterion) {
    let mut group = c.benchmark_group("run_to_sentinel");

    for reports in [1usize, 100, 1_000] {
        group.throughput(Throughput::Elements(reports as u64));
        group.bench_with_input(BenchmarkId::from_parameter(reports), &reports, |b, &n| {
            b.iter_batched(
                || scripted_mapper(n),
                |mapper| black_box(run_to_sentinel(mapper)),
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

fn bench_iteration_steps(c: &mut Criterion) {
    let input = vec![0x14; READ_LENGTH];
    let mut report = GipReport::zeroed();

    c.bench_function("passthrough_convert", |b| {
        b.iter(|| passthrough_converter(black_box(&input), &mut report));
    });

    c.bench_function("termination_request_detect", |b| {
        let report = GipReport::from_bytes([0x0C; gip_report::GIP_REPORT_LEN]);
        b.iter(|| black_box(&report).termination_request());
    });
}

criterion_group!(benches, bench_run_to_sentinel, bench_iteration_steps);
criterion_main!(benches);
