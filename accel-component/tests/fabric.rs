// Copyright 2022 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Complete passes over the simulated fabric with the service threads
//! running.

use accel_component::*;
use accel_interface::*;
use accel_shared::*;
use fake_accel_hw::{sobel_filter, Channel, Completion, FakeFabric, SimOptions};
use std::thread;
use std::time::Duration;

const TIMEOUT: Option<Duration> = Some(Duration::from_secs(5));

fn group(index: usize) -> AccelGroup { AccelGroup::new(index).unwrap() }

fn image(rows: u32, cols: u32, seed: u32) -> Vec<u32> {
    (0..rows * cols).map(|i| (i * 31 + seed * 7 + i / cols * 13) % 256).collect()
}

fn to_bytes(pixels: &[u32]) -> Vec<u8> { pixels.iter().flat_map(|p| p.to_le_bytes()).collect() }

fn filtered(pixels: &[u32], rows: u32, cols: u32) -> Vec<u8> {
    sobel_filter(&to_bytes(pixels), rows as usize, cols as usize)
}

fn assert_monotonic(metrics: &Metrics) {
    for phase in Phase::ALL {
        let (start, end) = (metrics.stamp(phase, Edge::Start), metrics.stamp(phase, Edge::End));
        if start != 0 && end != 0 {
            assert!(end >= start, "{:?}", phase);
        }
    }
}

fn manual_fabric(config: FabricConfig) -> Fabric {
    let options = SimOptions {
        completion: Completion::Manual,
        bar_windows: config.bar_addresses.clone(),
        sched_buffer: config.sched_buffer,
        ..Default::default()
    };
    Fabric::with_hardware(config, FakeFabric::new(&options)).unwrap()
}

// Runs |group| on an image at a per-group host address and checks the
// result landed filtered.
fn image_pass(fabric: &Fabric, index: usize, rows: u32, cols: u32) -> Metrics {
    let pixels = image(rows, cols, index as u32);
    let source = 0x1000_0000 + index as u32 * 0x10_0000;
    let destination = 0x2000_0000 + index as u32 * 0x10_0000;
    fabric.hw().memory.write_u32s(source as u64, &pixels);
    let metrics = fabric
        .accelerate(
            group(index),
            100 + index as u32,
            &ImageJob {
                rows,
                cols,
                source_address: source,
                destination_address: destination,
                offset: 0,
            },
        )
        .unwrap();
    let out = fabric.hw().memory.read(destination as u64, (rows * cols * 4) as usize);
    assert_eq!(out, filtered(&pixels, rows, cols), "{}", group(index));
    metrics
}

const MM2S_LIST: u64 = 0x3000_0000;
const S2MM_LIST: u64 = 0x3000_1000;

fn sg_pass(fabric: &Fabric, rows: u32, cols: u32) -> Metrics {
    let page = fabric.config().page_size as usize;
    let pixels = image(rows, cols, 99);
    let bytes = to_bytes(&pixels);
    let pages = bytes.len().div_ceil(page);
    let memory = &fabric.hw().memory;
    for p in 0..pages {
        let source = 0x5000_0000 + (p as u64) * 0x2000;
        let destination = 0x6000_0000 + ((pages - p) as u64) * 0x2000;
        memory.write_u64(MM2S_LIST + 8 * p as u64, source);
        memory.write_u64(S2MM_LIST + 8 * p as u64, destination);
        let end = bytes.len().min((p + 1) * page);
        memory.write(source, &bytes[p * page..end]);
    }
    let metrics = fabric
        .accelerate_sg(
            7,
            &SgJob {
                rows,
                cols,
                mm2s_sg_list: MM2S_LIST,
                s2mm_sg_list: S2MM_LIST,
            },
        )
        .unwrap();
    let mut out = Vec::new();
    for p in 0..pages {
        let destination = 0x6000_0000 + ((pages - p) as u64) * 0x2000;
        let len = page.min(bytes.len() - p * page);
        out.extend(memory.read(destination, len));
    }
    assert_eq!(out, filtered(&pixels, rows, cols));
    metrics
}

#[test]
fn every_group_concurrently() {
    init_logger(log::LevelFilter::Warn);
    let fabric = Fabric::new(FabricConfig::default()).unwrap();
    let (rows, cols) = (24, 32);
    thread::scope(|s| {
        for index in 0..SG_GROUP {
            let fabric = &fabric;
            s.spawn(move || {
                let metrics = image_pass(fabric, index, rows, cols);
                assert_eq!((metrics.image_rows, metrics.image_cols), (rows, cols));
                assert!(metrics.elapsed(Phase::Total).is_some());
                assert_monotonic(&metrics);
            });
        }
        s.spawn(|| {
            let metrics = sg_pass(&fabric, rows, cols);
            assert!(metrics.elapsed(Phase::DmaAccel).is_some());
        });
    });

    let repository = fabric.repository();
    assert!(AccelGroup::all().all(|g| !repository.status.is_occupied(g)));
    assert_eq!(fabric.fetch_stats().served, NUM_SCHED_CLIENTS as u64);
    assert_eq!(fabric.send_stats().served, NUM_SCHED_CLIENTS as u64);
    // Direct and scatter/gather groups notify the host; indirect groups
    // signal their done line instead.
    assert_eq!(fabric.interrupt_stats().delivered, 3);
    assert_eq!(fabric.hw().msi.overlaps(), 0);
}

#[test]
fn indirect_phases_in_order() {
    let fabric = Fabric::new(FabricConfig::default()).unwrap();
    let metrics = image_pass(&fabric, 3, 16, 16);
    for phase in [Phase::CdmaFetch, Phase::DmaAccel, Phase::CdmaSend, Phase::Sleep, Phase::Total] {
        assert!(metrics.elapsed(phase).is_some(), "{:?}", phase);
    }
    assert!(metrics.stamp(Phase::Total, Edge::Start) <= metrics.stamp(Phase::CdmaFetch, Edge::Start));
    assert!(metrics.stamp(Phase::CdmaFetch, Edge::End) <= metrics.stamp(Phase::DmaAccel, Edge::Start));
    assert!(metrics.stamp(Phase::DmaAccel, Edge::End) <= metrics.stamp(Phase::CdmaSend, Edge::Start));
    assert!(metrics.stamp(Phase::CdmaSend, Edge::End) <= metrics.stamp(Phase::Total, Edge::End));
    assert_eq!(metrics.apm_read_bytes, 16 * 16 * 4);
}

#[test]
fn pcie_mode_notifies_host_for_indirect_groups() {
    let fabric = Fabric::new(FabricConfig {
        pcie_mode: true,
        ..Default::default()
    })
    .unwrap();
    for index in ACCEL_GROUP_JUMP..SG_GROUP {
        image_pass(&fabric, index, 8, 12);
    }
    assert_eq!(fabric.interrupt_stats().delivered, NUM_SCHED_CLIENTS as u64);
    assert_eq!(fabric.hw().bridge.translation(1), 0x2000_0000 + 5 * 0x10_0000);
}

#[test]
fn interrupt_manager_restarted_per_request() {
    let fabric = Fabric::new(FabricConfig {
        auto_restart: false,
        ..Default::default()
    })
    .unwrap();
    for _ in 0..3 {
        image_pass(&fabric, 0, 8, 8);
        image_pass(&fabric, 1, 8, 8);
    }
    assert_eq!(fabric.interrupt_stats().delivered, 6);
}

#[test]
fn scatter_gather_small_pages() {
    let fabric = Fabric::new(FabricConfig {
        page_size: 512,
        ..Default::default()
    })
    .unwrap();
    let metrics = sg_pass(&fabric, 10, 30);
    assert_eq!(metrics.apm_read_bytes, 10 * 30 * 4);
    assert!(fabric.accelerate(group(SG_GROUP), 1, &ImageJob::default()) == Err(AccelError::InvalidGroup));
    let empty = SgJob {
        cols: 30,
        ..Default::default()
    };
    assert_eq!(accel_accelerate_sg(&fabric, 8, empty), Err(AccelError::InvalidRequest));
    assert!(!fabric.repository().status.is_occupied(group(SG_GROUP)));
}

#[test]
fn busy_group_rejects_second_pass() {
    let fabric = manual_fabric(FabricConfig::default());
    let job = ImageJob {
        rows: 4,
        cols: 4,
        source_address: 0x1000_0000,
        destination_address: 0x2000_0000,
        offset: 0,
    };
    thread::scope(|s| {
        let first = s.spawn(|| fabric.accelerate(group(0), 1, &job));
        let dma = &fabric.hw().group(group(0)).dma;
        // The pass holds the group until its transfer finishes.
        assert!(dma.fire(Channel::Mm2s, TIMEOUT));
        assert_eq!(fabric.accelerate(group(0), 2, &job), Err(AccelError::GroupBusy));
        assert!(fabric.repository().status.is_occupied(group(0)));
        assert!(dma.fire(Channel::S2mm, TIMEOUT));
        assert!(first.join().unwrap().is_ok());
    });
    assert!(fabric.accelerate(group(0), 0, &job) == Err(AccelError::InvalidRequest));
}

#[test]
fn hung_dma_times_out_and_frees_group() {
    let fabric = manual_fabric(FabricConfig {
        irq_timeout: Some(Duration::from_millis(50)),
        ..Default::default()
    });
    let job = ImageJob {
        rows: 4,
        cols: 4,
        source_address: 0x1000_0000,
        destination_address: 0x2000_0000,
        offset: 0,
    };
    for pid in [1, 2] {
        assert_eq!(fabric.accelerate(group(1), pid, &job), Err(AccelError::DmaTimeout));
    }
    let metrics = fabric.metrics(group(1));
    assert_eq!(metrics.stamp(Phase::DmaAccel, Edge::End), 0);
    assert_eq!(metrics.stamp(Phase::Total, Edge::End), 0);
}

fn wait_until(done: impl Fn() -> bool) {
    for _ in 0..5000 {
        if done() {
            return;
        }
        thread::sleep(Duration::from_millis(1));
    }
    panic!("condition never reached");
}

fn small_job() -> ImageJob {
    ImageJob {
        rows: 4,
        cols: 4,
        source_address: 0x1000_0000,
        destination_address: 0x2000_0000,
        offset: 0,
    }
}

#[test]
fn late_done_line_does_not_complete_pass() {
    let fabric = manual_fabric(FabricConfig {
        irq_timeout: Some(Duration::from_millis(200)),
        ..Default::default()
    });
    let slot = group(2).sched_slot().unwrap();
    // What a send served after its pass gave up leaves behind.
    fabric.hw().done_lines[slot].raise();
    thread::scope(|s| {
        let pass = s.spawn(|| fabric.accelerate(group(2), 1, &small_job()));
        assert!(fabric.hw().cdma_fetch.fire(TIMEOUT));
        let dma = &fabric.hw().group(group(2)).dma;
        assert!(dma.fire(Channel::Mm2s, TIMEOUT));
        assert!(dma.fire(Channel::S2mm, TIMEOUT));
        // The send is never completed, so neither is the pass.
        assert_eq!(pass.join().unwrap(), Err(AccelError::CompletionTimeout));
    });
    assert!(!fabric.hw().done_lines[slot].level());
    assert_eq!(fabric.metrics(group(2)).stamp(Phase::Total, Edge::End), 0);
}

#[test]
fn late_vector_does_not_complete_next_pass() {
    let config = FabricConfig {
        irq_timeout: Some(Duration::from_millis(100)),
        ..Default::default()
    };
    let options = SimOptions {
        msi_ack: Completion::Manual,
        bar_windows: config.bar_addresses.clone(),
        sched_buffer: config.sched_buffer,
        ..Default::default()
    };
    let fabric = Fabric::with_hardware(config, FakeFabric::new(&options)).unwrap();
    let vector = group(0).vector();

    // Unacknowledged, so the host never receives it in time.
    assert_eq!(
        fabric.accelerate(group(0), 1, &small_job()),
        Err(AccelError::CompletionTimeout)
    );
    // The interrupt manager retries and the host finally takes it.
    wait_until(|| fabric.interrupt_stats().ack_timeouts >= 1);
    assert_eq!(fabric.hw().msi.acknowledge(TIMEOUT), Some(vector));
    wait_until(|| fabric.interrupt_stats().delivered == 1);

    assert_eq!(
        fabric.accelerate(group(0), 2, &small_job()),
        Err(AccelError::CompletionTimeout)
    );
    assert_eq!(fabric.hw().msi.discard(vector), 0);
}

#[test]
fn requests_over_postcard() {
    let fabric = Fabric::new(FabricConfig::default()).unwrap();
    let (rows, cols) = (6, 6);
    let pixels = image(rows, cols, 1);
    fabric.hw().memory.write_u32s(0x1000_0000, &pixels);
    let job = ImageJob {
        rows,
        cols,
        source_address: 0x1000_0000,
        destination_address: 0x2000_0000,
        offset: 0,
    };

    let metrics = accel_accelerate(&fabric, group(1), 42, job).unwrap();
    assert_eq!(metrics.image_rows, rows);
    assert_eq!(accel_get_metrics(&fabric, group(1)), Ok(metrics));
    assert_eq!(
        fabric.hw().memory.read(0x2000_0000, (rows * cols * 4) as usize),
        filtered(&pixels, rows, cols)
    );
    assert_eq!(accel_debug_state(&fabric), Ok(()));

    let mut reply = [0u8; ACCEL_REPLY_DATA_SIZE];
    assert_eq!(fabric.call(&[0xff, 0xff], &mut reply), AccelError::DeserializeFailed);
    let mut request = [0u8; ACCEL_REQUEST_DATA_SIZE];
    let bad_group = postcard::to_slice(&AccelRequest::GetMetrics { group: 9 }, &mut request).unwrap();
    assert_eq!(fabric.call(bad_group, &mut reply), AccelError::InvalidGroup);
}

#[test]
fn shutdown_refuses_new_passes() {
    let fabric = Fabric::new(FabricConfig::default()).unwrap();
    image_pass(&fabric, 0, 4, 4);
    fabric.shutdown();
    fabric.shutdown();
    assert_eq!(
        fabric.accelerate(group(0), 1, &ImageJob::default()),
        Err(AccelError::ShuttingDown)
    );
}
