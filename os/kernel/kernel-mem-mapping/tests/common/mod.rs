#![allow(dead_code)]

use kernel_mem_mapping::addresses::{PhysicalAddress, VirtualAddress};
use kernel_mem_mapping::{
    CachePolicy, ExecutionContext, IoSpaceMapper, Irql, LockOperation, PagePinning,
    PagePriority, PlatformFault, TargetContext,
};
use log::{Level, LevelFilter, Log, Metadata, Record};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::ptr::NonNull;
use std::sync::Once;

/// Every primitive the fake platform was asked to perform, in order.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Call {
    Allocate { address: VirtualAddress, len: u32 },
    Free { id: u32 },
    Lock { id: u32, operation: LockOperation },
    Unlock { id: u32 },
    Map { id: u32, target: TargetContext, cache: CachePolicy, priority: PagePriority },
    Unmap { id: u32, address: usize },
    MapIo { address: PhysicalAddress, size: usize, cache: CachePolicy },
    UnmapIo { address: usize, size: usize },
}

/// Primitives that can be made to unwind instead of returning.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Primitive {
    Allocate,
    Free,
    Unlock,
    Unmap,
    UnmapIo,
}

#[derive(Debug)]
pub struct FakeDescriptor {
    id: u32,
    locked: bool,
}

/// In-memory platform: descriptors are counters, mappings are heap buffers.
#[derive(Default)]
pub struct FakePlatform {
    irql: Cell<u8>,
    next_id: Cell<u32>,
    pub fail_allocate: Cell<bool>,
    pub lock_fault: Cell<Option<PlatformFault>>,
    pub map_fault: Cell<Option<PlatformFault>>,
    pub refuse_map: Cell<bool>,
    /// Physical ranges starting at or above this address are rejected.
    pub io_limit: Cell<Option<u64>>,
    pub io_fault: Cell<Option<PlatformFault>>,
    /// Primitive that panics after recording its call.
    pub trap: Cell<Option<Primitive>>,
    calls: RefCell<Vec<Call>>,
    live: RefCell<HashMap<usize, Box<[u64]>>>,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_irql(&self, irql: Irql) {
        self.irql.set(irql.to_u8());
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.borrow().iter().filter(|c| pred(c)).count()
    }

    pub fn live_mappings(&self) -> usize {
        self.live.borrow().len()
    }

    fn record(&self, call: Call) {
        self.calls.borrow_mut().push(call);
    }

    fn maybe_trap(&self, primitive: Primitive) {
        if self.trap.get() == Some(primitive) {
            panic!("{primitive:?} trapped");
        }
    }

    fn fresh_mapping(&self, len: usize) -> NonNull<u8> {
        // u64 backing so register-width accesses are aligned.
        let mut buffer = vec![0u64; len.div_ceil(8).max(1)].into_boxed_slice();
        let ptr = NonNull::new(buffer.as_mut_ptr().cast::<u8>()).expect("boxed slice is never null");
        self.live.borrow_mut().insert(ptr.as_ptr() as usize, buffer);
        ptr
    }

    fn release_mapping(&self, address: NonNull<u8>) {
        let removed = self.live.borrow_mut().remove(&(address.as_ptr() as usize));
        assert!(removed.is_some(), "unmapping unknown address {address:p}");
    }
}

impl ExecutionContext for FakePlatform {
    fn current_irql(&self) -> Irql {
        Irql::try_from(self.irql.get()).expect("valid level")
    }
}

impl PagePinning for FakePlatform {
    type Descriptor = FakeDescriptor;

    fn allocate_descriptor(&self, address: VirtualAddress, len: u32) -> Option<FakeDescriptor> {
        self.record(Call::Allocate { address, len });
        self.maybe_trap(Primitive::Allocate);
        if self.fail_allocate.get() {
            return None;
        }
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        Some(FakeDescriptor { id, locked: false })
    }

    fn free_descriptor(&self, descriptor: FakeDescriptor) {
        self.record(Call::Free { id: descriptor.id });
        self.maybe_trap(Primitive::Free);
    }

    fn probe_and_lock(
        &self,
        descriptor: &mut FakeDescriptor,
        operation: LockOperation,
    ) -> Result<(), PlatformFault> {
        self.record(Call::Lock { id: descriptor.id, operation });
        if let Some(fault) = self.lock_fault.get() {
            return Err(fault);
        }
        assert!(!descriptor.locked, "pages pinned twice");
        descriptor.locked = true;
        Ok(())
    }

    fn unlock(&self, descriptor: &mut FakeDescriptor) {
        self.record(Call::Unlock { id: descriptor.id });
        self.maybe_trap(Primitive::Unlock);
        assert!(descriptor.locked, "unpinning pages that were never pinned");
        descriptor.locked = false;
    }

    fn map_locked(
        &self,
        descriptor: &mut FakeDescriptor,
        target: TargetContext,
        cache: CachePolicy,
        priority: PagePriority,
    ) -> Result<Option<NonNull<u8>>, PlatformFault> {
        self.record(Call::Map { id: descriptor.id, target, cache, priority });
        assert!(descriptor.locked, "mapping pages that are not pinned");
        if let Some(fault) = self.map_fault.get() {
            return Err(fault);
        }
        if self.refuse_map.get() {
            return Ok(None);
        }
        Ok(Some(self.fresh_mapping(4096)))
    }

    fn unmap_locked(&self, address: NonNull<u8>, descriptor: &mut FakeDescriptor) {
        self.record(Call::Unmap { id: descriptor.id, address: address.as_ptr() as usize });
        self.maybe_trap(Primitive::Unmap);
        self.release_mapping(address);
    }
}

impl IoSpaceMapper for FakePlatform {
    fn map_io_space(
        &self,
        address: PhysicalAddress,
        size: usize,
        cache: CachePolicy,
    ) -> Result<Option<NonNull<u8>>, PlatformFault> {
        self.record(Call::MapIo { address, size, cache });
        if let Some(fault) = self.io_fault.get() {
            return Err(fault);
        }
        if self.io_limit.get().is_some_and(|limit| address.as_u64() >= limit) {
            return Ok(None);
        }
        Ok(Some(self.fresh_mapping(size)))
    }

    fn unmap_io_space(&self, address: NonNull<u8>, size: usize) {
        self.record(Call::UnmapIo { address: address.as_ptr() as usize, size });
        self.maybe_trap(Primitive::UnmapIo);
        self.release_mapping(address);
    }
}

thread_local! {
    static RECORDS: RefCell<Vec<(Level, String)>> = const { RefCell::new(Vec::new()) };
}

/// Collects log records per test thread.
struct CaptureLogger;

impl Log for CaptureLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        RECORDS.with(|r| r.borrow_mut().push((record.level(), record.args().to_string())));
    }

    fn flush(&self) {}
}

static LOGGER: CaptureLogger = CaptureLogger;

pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        log::set_logger(&LOGGER).expect("logger installed once");
        log::set_max_level(LevelFilter::Trace);
    });
    RECORDS.with(|r| r.borrow_mut().clear());
}

/// Messages logged on this thread at `level` since [`init_logging`].
pub fn logged(level: Level) -> Vec<String> {
    RECORDS.with(|r| {
        r.borrow()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m.clone())
            .collect()
    })
}
