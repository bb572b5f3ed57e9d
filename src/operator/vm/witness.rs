//! Witness calculation inside an embedded wasm VM.
//!
//! Circuits compile to a witness-calculator module that talks to its host
//! through a small shared read/write window of 32-bit words. Field elements
//! cross that window one word at a time, least-significant word first.
//! Input signals are addressed by the 64-bit FNV-1a hash of their name.
//!
//! The result is serialized in the `wtns` v2 container so it can be handed to
//! the prover as opaque bytes.

use crate::error::{ZkError, ZkResult};
use wasmtime::{Caller, Engine, Linker, Memory, MemoryType, Module, Store, TypedFunc};

/// Linear memory given to the calculator, in 64 KiB pages. Fixed: the VM
/// cannot grow past it.
pub const DEFAULT_WITNESS_MEMORY_PAGES: u32 = 2000;

const FNV_OFFSET_BASIS: u64 = 0xCBF2_9CE4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01B3;

const WTNS_MAGIC: &[u8; 4] = b"wtns";
const WTNS_VERSION: u32 = 2;
const WTNS_HEADER_SECTION: u32 = 1;
const WTNS_DATA_SECTION: u32 = 2;

pub fn fnv1a_64(name: &str) -> u64 {
    name.bytes().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME)
    })
}

fn describe_exception(code: i32) -> &'static str {
    match code {
        1 => "signal not found",
        2 => "too many signals set",
        3 => "signal already set",
        4 => "assert failed",
        5 => "not enough memory",
        6 => "input signal array access exceeds the size",
        _ => "unknown error",
    }
}

#[derive(Default)]
struct HostState {
    exception: Option<i32>,
    messages: Vec<String>,
}

/// Drain the calculator's pending message through its `getMessageChar` export.
fn read_message(caller: &mut Caller<'_, HostState>) -> String {
    let Some(func) = caller
        .get_export("getMessageChar")
        .and_then(|export| export.into_func())
    else {
        return String::new();
    };
    let Ok(next) = func.typed::<(), i32>(&*caller) else {
        return String::new();
    };

    let mut message = String::new();
    while let Ok(ch) = next.call(&mut *caller, ()) {
        if ch <= 0 || message.len() >= 4096 {
            break;
        }
        message.push(char::from(ch as u8));
    }
    message
}

/// A compiled witness calculator. Compilation happens once; every
/// calculation instantiates a fresh store.
pub struct CircuitVm {
    engine: Engine,
    module: Module,
    memory_pages: u32,
}

impl CircuitVm {
    pub fn compile(bytecode: &[u8], memory_pages: u32) -> ZkResult<Self> {
        let engine = Engine::default();
        let module = Module::new(&engine, bytecode)
            .map_err(|e| ZkError::Witness(format!("invalid circuit module: {:#}", e)))?;
        Ok(Self {
            engine,
            module,
            memory_pages,
        })
    }

    /// Set every input signal (bit values, one element each) and return the
    /// full witness as a `wtns` file.
    pub fn calculate(&self, signals: &[(&str, &[u8])]) -> ZkResult<Vec<u8>> {
        let mut session = Session::start(self)?;
        session.init()?;

        let n32 = session.field_words()?;
        let prime = session.raw_prime(n32)?;

        let mut total = 0usize;
        for (name, values) in signals {
            session.set_signal(name, values, n32)?;
            total += values.len();
        }
        if let Some(expected) = session.input_size()? {
            if total != expected {
                return Err(ZkError::Witness(format!(
                    "circuit expects {} input values, {} were set",
                    expected, total
                )));
            }
        }

        let count = session.witness_size()?;
        let mut data = Vec::with_capacity(count * n32 * 4);
        for index in 0..count {
            session.witness_element(index, n32, &mut data)?;
        }

        Ok(encode_wtns(&prime, count, &data))
    }
}

struct Exports {
    init: TypedFunc<i32, ()>,
    get_field_num_len32: TypedFunc<(), i32>,
    get_raw_prime: TypedFunc<(), ()>,
    read_shared_rw_memory: TypedFunc<i32, i32>,
    write_shared_rw_memory: TypedFunc<(i32, i32), ()>,
    get_input_signal_size: TypedFunc<(i32, i32), i32>,
    set_input_signal: TypedFunc<(i32, i32, i32), ()>,
    get_witness_size: TypedFunc<(), i32>,
    get_witness: TypedFunc<i32, ()>,
    get_input_size: Option<TypedFunc<(), i32>>,
}

struct Session {
    store: Store<HostState>,
    exports: Exports,
}

impl Session {
    fn start(vm: &CircuitVm) -> ZkResult<Self> {
        let link_err = |e: wasmtime::Error| ZkError::Witness(format!("linking circuit: {:#}", e));

        let mut store = Store::new(&vm.engine, HostState::default());
        let memory = Memory::new(
            &mut store,
            MemoryType::new(vm.memory_pages, Some(vm.memory_pages)),
        )
        .map_err(link_err)?;

        let mut linker = Linker::new(&vm.engine);
        linker.define(&store, "env", "memory", memory).map_err(link_err)?;
        linker
            .func_wrap(
                "runtime",
                "exceptionHandler",
                |mut caller: Caller<'_, HostState>, code: i32| -> wasmtime::Result<()> {
                    caller.data_mut().exception = Some(code);
                    Err(wasmtime::Error::msg(describe_exception(code)))
                },
            )
            .map_err(link_err)?;
        for name in ["printErrorMessage", "writeBufferMessage"] {
            linker
                .func_wrap("runtime", name, |mut caller: Caller<'_, HostState>| {
                    let message = read_message(&mut caller);
                    if !message.is_empty() {
                        tracing::debug!(%message, "circuit message");
                        caller.data_mut().messages.push(message);
                    }
                })
                .map_err(link_err)?;
        }
        linker
            .func_wrap("runtime", "showSharedRWMemory", || {})
            .map_err(link_err)?;
        linker
            .define_unknown_imports_as_traps(&vm.module)
            .map_err(link_err)?;

        let instance = linker
            .instantiate(&mut store, &vm.module)
            .map_err(|e| ZkError::Witness(format!("instantiating circuit: {:#}", e)))?;

        let missing = |name: &str, e: wasmtime::Error| {
            ZkError::Witness(format!("circuit export {}: {:#}", name, e))
        };
        macro_rules! export {
            ($name:literal) => {
                instance
                    .get_typed_func(&mut store, $name)
                    .map_err(|e| missing($name, e))?
            };
        }

        let exports = Exports {
            init: export!("init"),
            get_field_num_len32: export!("getFieldNumLen32"),
            get_raw_prime: export!("getRawPrime"),
            read_shared_rw_memory: export!("readSharedRWMemory"),
            write_shared_rw_memory: export!("writeSharedRWMemory"),
            get_input_signal_size: export!("getInputSignalSize"),
            set_input_signal: export!("setInputSignal"),
            get_witness_size: export!("getWitnessSize"),
            get_witness: export!("getWitness"),
            get_input_size: instance.get_typed_func(&mut store, "getInputSize").ok(),
        };

        Ok(Self { store, exports })
    }

    fn fail(&self, step: &str, err: wasmtime::Error) -> ZkError {
        let state = self.store.data();
        let mut detail = match state.exception {
            Some(code) => format!("{} (code {})", describe_exception(code), code),
            None => format!("{:#}", err),
        };
        if !state.messages.is_empty() {
            detail.push_str(": ");
            detail.push_str(&state.messages.join("; "));
        }
        ZkError::Witness(format!("{}: {}", step, detail))
    }

    fn init(&mut self) -> ZkResult<()> {
        self.exports
            .init
            .call(&mut self.store, 1)
            .map_err(|e| self.fail("init", e))
    }

    fn field_words(&mut self) -> ZkResult<usize> {
        let n32 = self
            .exports
            .get_field_num_len32
            .call(&mut self.store, ())
            .map_err(|e| self.fail("getFieldNumLen32", e))?;
        usize::try_from(n32)
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| ZkError::Witness(format!("invalid field width {}", n32)))
    }

    fn read_shared(&mut self, n32: usize, out: &mut Vec<u8>) -> ZkResult<()> {
        for j in 0..n32 {
            let word = self
                .exports
                .read_shared_rw_memory
                .call(&mut self.store, j as i32)
                .map_err(|e| self.fail("readSharedRWMemory", e))?;
            out.extend_from_slice(&(word as u32).to_le_bytes());
        }
        Ok(())
    }

    fn raw_prime(&mut self, n32: usize) -> ZkResult<Vec<u8>> {
        self.exports
            .get_raw_prime
            .call(&mut self.store, ())
            .map_err(|e| self.fail("getRawPrime", e))?;
        let mut prime = Vec::with_capacity(n32 * 4);
        self.read_shared(n32, &mut prime)?;
        Ok(prime)
    }

    fn input_size(&mut self) -> ZkResult<Option<usize>> {
        let Some(func) = self.exports.get_input_size.clone() else {
            return Ok(None);
        };
        let size = func
            .call(&mut self.store, ())
            .map_err(|e| self.fail("getInputSize", e))?;
        Ok(usize::try_from(size).ok())
    }

    fn set_signal(&mut self, name: &str, values: &[u8], n32: usize) -> ZkResult<()> {
        let hash = fnv1a_64(name);
        let (msb, lsb) = ((hash >> 32) as u32 as i32, hash as u32 as i32);

        let size = self
            .exports
            .get_input_signal_size
            .call(&mut self.store, (msb, lsb))
            .map_err(|e| self.fail("getInputSignalSize", e))?;
        if size < 0 {
            return Err(ZkError::Witness(format!("signal '{}' not found", name)));
        }
        if size as usize != values.len() {
            return Err(ZkError::Witness(format!(
                "signal '{}' expects {} values, got {}",
                name,
                size,
                values.len()
            )));
        }

        for (index, value) in values.iter().enumerate() {
            for j in 0..n32 {
                let word = if j == 0 { i32::from(*value) } else { 0 };
                self.exports
                    .write_shared_rw_memory
                    .call(&mut self.store, (j as i32, word))
                    .map_err(|e| self.fail("writeSharedRWMemory", e))?;
            }
            self.exports
                .set_input_signal
                .call(&mut self.store, (msb, lsb, index as i32))
                .map_err(|e| self.fail(&format!("setInputSignal({})", name), e))?;
        }
        Ok(())
    }

    fn witness_size(&mut self) -> ZkResult<usize> {
        let size = self
            .exports
            .get_witness_size
            .call(&mut self.store, ())
            .map_err(|e| self.fail("getWitnessSize", e))?;
        usize::try_from(size)
            .map_err(|_| ZkError::Witness(format!("invalid witness size {}", size)))
    }

    fn witness_element(&mut self, index: usize, n32: usize, out: &mut Vec<u8>) -> ZkResult<()> {
        self.exports
            .get_witness
            .call(&mut self.store, index as i32)
            .map_err(|e| self.fail("getWitness", e))?;
        self.read_shared(n32, out)
    }
}

/// Serialize a witness into the `wtns` v2 container. `data` holds `count`
/// little-endian elements of `prime.len()` bytes each.
pub fn encode_wtns(prime: &[u8], count: usize, data: &[u8]) -> Vec<u8> {
    let n8 = prime.len();
    let mut out = Vec::with_capacity(12 + 12 + 4 + n8 + 4 + 12 + data.len());

    out.extend_from_slice(WTNS_MAGIC);
    out.extend_from_slice(&WTNS_VERSION.to_le_bytes());
    out.extend_from_slice(&2u32.to_le_bytes());

    out.extend_from_slice(&WTNS_HEADER_SECTION.to_le_bytes());
    out.extend_from_slice(&((4 + n8 + 4) as u64).to_le_bytes());
    out.extend_from_slice(&(n8 as u32).to_le_bytes());
    out.extend_from_slice(prime);
    out.extend_from_slice(&(count as u32).to_le_bytes());

    out.extend_from_slice(&WTNS_DATA_SECTION.to_le_bytes());
    out.extend_from_slice(&(data.len() as u64).to_le_bytes());
    out.extend_from_slice(data);
    out
}

/// Decoded `wtns` file: field prime and flat little-endian element data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WtnsFile {
    pub prime: Vec<u8>,
    pub data: Vec<u8>,
}

impl WtnsFile {
    pub fn element_bytes(&self) -> usize {
        self.prime.len()
    }

    pub fn elements(&self) -> impl Iterator<Item = &[u8]> {
        self.data.chunks_exact(self.element_bytes())
    }

    pub fn len(&self) -> usize {
        self.data.len() / self.element_bytes()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> ZkResult<&'a [u8]> {
        if self.bytes.len() < n {
            return Err(ZkError::Witness("truncated wtns data".to_string()));
        }
        let (head, tail) = self.bytes.split_at(n);
        self.bytes = tail;
        Ok(head)
    }

    fn u32(&mut self) -> ZkResult<u32> {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(self.take(4)?);
        Ok(u32::from_le_bytes(buf))
    }

    fn u64(&mut self) -> ZkResult<u64> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.take(8)?);
        Ok(u64::from_le_bytes(buf))
    }
}

pub fn decode_wtns(bytes: &[u8]) -> ZkResult<WtnsFile> {
    let mut reader = Reader { bytes };
    if reader.take(4)? != WTNS_MAGIC {
        return Err(ZkError::Witness("not a wtns file".to_string()));
    }
    let version = reader.u32()?;
    if version != WTNS_VERSION {
        return Err(ZkError::Witness(format!("unsupported wtns version {}", version)));
    }

    let sections = reader.u32()?;
    let mut header: Option<(Vec<u8>, usize)> = None;
    let mut data: Option<&[u8]> = None;
    for _ in 0..sections {
        let kind = reader.u32()?;
        let size = usize::try_from(reader.u64()?)
            .map_err(|_| ZkError::Witness("wtns section too large".to_string()))?;
        let body = reader.take(size)?;
        match kind {
            WTNS_HEADER_SECTION => {
                let mut section = Reader { bytes: body };
                let n8 = section.u32()? as usize;
                let prime = section.take(n8)?.to_vec();
                let count = section.u32()? as usize;
                header = Some((prime, count));
            }
            WTNS_DATA_SECTION => data = Some(body),
            _ => {}
        }
    }

    let (prime, count) = header.ok_or_else(|| ZkError::Witness("wtns header missing".to_string()))?;
    let data = data.ok_or_else(|| ZkError::Witness("wtns data missing".to_string()))?;
    if prime.is_empty() || data.len() != prime.len() * count {
        return Err(ZkError::Witness(format!(
            "wtns data holds {} bytes, header declares {} elements of {} bytes",
            data.len(),
            count,
            prime.len()
        )));
    }

    Ok(WtnsFile {
        prime,
        data: data.to_vec(),
    })
}
