//! C ABI of the native prover/verifier libraries.
//!
//! Two shared objects per host, `{platform}-{arch}-libprove.so` and
//! `{platform}-{arch}-libverify.so`, exporting:
//!
//! ```text
//! InitAlgorithm(u8 id, slice pk, slice r1cs) -> u8    1 = ok
//! Prove(slice request)  -> { void* buf, i64 len }     caller frees buf
//! Free(void* buf)
//! Verify(slice request) -> u8                         1 = valid
//! ```
//!
//! Everything unsafe about the boundary is confined to this file.

use super::NativeProver;
use crate::algorithm::Cipher;
use crate::error::{ZkError, ZkResult};
use libloading::Library;
use std::ffi::c_void;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;

const STATUS_OK: u8 = 1;

/// Borrowed byte slice in the layout the libraries expect.
#[repr(C)]
struct GoSlice<'a> {
    data: *const c_void,
    len: i64,
    cap: i64,
    _marker: PhantomData<&'a [u8]>,
}

impl<'a> GoSlice<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self {
            data: bytes.as_ptr().cast(),
            len: bytes.len() as i64,
            cap: bytes.len() as i64,
            _marker: PhantomData,
        }
    }
}

#[repr(C)]
struct ProveReturn {
    r0: *mut c_void,
    r1: i64,
}

type InitAlgorithmFn = unsafe extern "C" fn(u8, GoSlice<'_>, GoSlice<'_>) -> u8;
type ProveFn = unsafe extern "C" fn(GoSlice<'_>) -> ProveReturn;
type FreeFn = unsafe extern "C" fn(*mut c_void);
type VerifyFn = unsafe extern "C" fn(GoSlice<'_>) -> u8;

/// A buffer allocated by the foreign side, released through its `Free` on drop.
struct ForeignBuffer {
    ptr: NonNull<u8>,
    len: usize,
    free: FreeFn,
}

impl ForeignBuffer {
    /// # Safety
    ///
    /// `ptr` must be null or point to `len` readable bytes owned by the
    /// library that exported `free`.
    unsafe fn from_raw(ptr: *mut c_void, len: i64, free: FreeFn) -> ZkResult<Self> {
        let ptr = NonNull::new(ptr.cast::<u8>())
            .ok_or_else(|| ZkError::Prover("prover returned no output".to_string()))?;
        let mut buffer = Self { ptr, len: 0, free };
        buffer.len = usize::try_from(len)
            .map_err(|_| ZkError::Prover(format!("prover returned invalid length {}", len)))?;
        Ok(buffer)
    }

    fn as_slice(&self) -> &[u8] {
        // SAFETY: from_raw's contract; the buffer lives until drop.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

impl Drop for ForeignBuffer {
    fn drop(&mut self) {
        // SAFETY: the pointer came from the same library and is freed once.
        unsafe { (self.free)(self.ptr.as_ptr().cast()) }
    }
}

/// Host naming used in library file names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPlatform {
    pub platform: String,
    pub arch: String,
}

impl HostPlatform {
    pub fn current() -> Self {
        Self::from_rust(std::env::consts::OS, std::env::consts::ARCH)
    }

    pub fn from_rust(os: &str, arch: &str) -> Self {
        let platform = match os {
            "macos" => "darwin",
            other => other,
        };
        let arch = match arch {
            "aarch64" => "arm64",
            other => other,
        };
        Self {
            platform: platform.to_string(),
            arch: arch.to_string(),
        }
    }

    pub fn library_path(&self, dir: &Path, kind: &str) -> PathBuf {
        dir.join(format!("{}-{}-lib{}.so", self.platform, self.arch, kind))
    }

    fn incompatible(&self, reason: impl ToString) -> ZkError {
        ZkError::IncompatibleBinary {
            platform: self.platform.clone(),
            arch: self.arch.clone(),
            reason: reason.to_string(),
        }
    }

    fn open(&self, dir: &Path, kind: &str) -> ZkResult<Library> {
        let path = self.library_path(dir, kind);
        if !path.exists() {
            return Err(ZkError::UnsupportedPlatform {
                platform: self.platform.clone(),
                arch: self.arch.clone(),
                path: path.display().to_string(),
            });
        }
        // SAFETY: the libraries run no initialisers beyond their language runtime.
        unsafe { Library::new(&path) }.map_err(|e| self.incompatible(e))
    }
}

/// Resolve a symbol and copy the function pointer out of the library.
///
/// # Safety
///
/// `T` must match the symbol's real signature.
unsafe fn symbol<T: Copy>(library: &Library, name: &[u8], host: &HostPlatform) -> ZkResult<T> {
    library.get::<T>(name).map(|sym| *sym).map_err(|e| {
        let printable = String::from_utf8_lossy(name.strip_suffix(b"\0").unwrap_or(name));
        host.incompatible(format!("missing symbol {}: {}", printable, e))
    })
}

/// The loaded prover/verifier pair.
pub struct NativeLibrary {
    init_algorithm: InitAlgorithmFn,
    prove: ProveFn,
    free: FreeFn,
    verify: VerifyFn,
    host: HostPlatform,
    // Keep both images mapped for as long as the function pointers above.
    _prove_lib: Library,
    _verify_lib: Library,
}

impl NativeLibrary {
    pub fn load(dir: &Path) -> ZkResult<Self> {
        Self::load_for(dir, HostPlatform::current())
    }

    pub fn load_for(dir: &Path, host: HostPlatform) -> ZkResult<Self> {
        let verify_lib = host.open(dir, "verify")?;
        let prove_lib = host.open(dir, "prove")?;

        // SAFETY: signatures follow the ABI documented at the top of this file.
        let (init_algorithm, prove, free, verify) = unsafe {
            (
                symbol::<InitAlgorithmFn>(&prove_lib, b"InitAlgorithm\0", &host)?,
                symbol::<ProveFn>(&prove_lib, b"Prove\0", &host)?,
                symbol::<FreeFn>(&prove_lib, b"Free\0", &host)?,
                symbol::<VerifyFn>(&verify_lib, b"Verify\0", &host)?,
            )
        };

        tracing::info!(
            platform = %host.platform,
            arch = %host.arch,
            dir = %dir.display(),
            "loaded native prover libraries"
        );

        Ok(Self {
            init_algorithm,
            prove,
            free,
            verify,
            host,
            _prove_lib: prove_lib,
            _verify_lib: verify_lib,
        })
    }

    pub fn host(&self) -> &HostPlatform {
        &self.host
    }
}

impl NativeProver for NativeLibrary {
    fn init_algorithm(&self, cipher: Cipher, proving_key: &[u8], circuit: &[u8]) -> ZkResult<()> {
        // SAFETY: both slices outlive the call; the callee copies what it keeps.
        let status = unsafe {
            (self.init_algorithm)(
                cipher.index(),
                GoSlice::new(proving_key),
                GoSlice::new(circuit),
            )
        };
        if status != STATUS_OK {
            return Err(ZkError::Backend(format!(
                "error initializing {} algorithm (status {})",
                cipher, status
            )));
        }
        Ok(())
    }

    fn prove(&self, request: &[u8]) -> ZkResult<Vec<u8>> {
        // SAFETY: request outlives the call; the result is owned by us until Free.
        let output = unsafe {
            let ret = (self.prove)(GoSlice::new(request));
            ForeignBuffer::from_raw(ret.r0, ret.r1, self.free)?
        };
        Ok(output.as_slice().to_vec())
    }

    fn verify(&self, request: &[u8]) -> ZkResult<bool> {
        // SAFETY: request outlives the call.
        let status = unsafe { (self.verify)(GoSlice::new(request)) };
        Ok(status == STATUS_OK)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static FREED: AtomicUsize = AtomicUsize::new(0);

    extern "C" fn counting_free(ptr: *mut c_void) {
        // SAFETY: tests only hand out pointers from Box<[u8; 4]>.
        drop(unsafe { Box::from_raw(ptr.cast::<[u8; 4]>()) });
        FREED.fetch_add(1, Ordering::SeqCst);
    }

    fn foreign_bytes() -> *mut c_void {
        Box::into_raw(Box::new([1u8, 2, 3, 4])).cast()
    }

    #[test]
    fn test_foreign_buffer_lifecycle() {
        let before = FREED.load(Ordering::SeqCst);

        let buffer = unsafe { ForeignBuffer::from_raw(foreign_bytes(), 4, counting_free) }.unwrap();
        assert_eq!(buffer.as_slice(), &[1, 2, 3, 4]);
        drop(buffer);
        assert_eq!(FREED.load(Ordering::SeqCst), before + 1);

        // A negative length is rejected but the buffer is still released.
        let err = unsafe { ForeignBuffer::from_raw(foreign_bytes(), -1, counting_free) };
        assert!(matches!(err, Err(ZkError::Prover(_))));
        assert_eq!(FREED.load(Ordering::SeqCst), before + 2);

        let err = unsafe { ForeignBuffer::from_raw(std::ptr::null_mut(), 0, counting_free) };
        assert!(matches!(err, Err(ZkError::Prover(_))));
        assert_eq!(FREED.load(Ordering::SeqCst), before + 2);
    }

    #[test]
    fn test_host_naming() {
        let mac = HostPlatform::from_rust("macos", "aarch64");
        assert_eq!(mac.platform, "darwin");
        assert_eq!(mac.arch, "arm64");
        assert_eq!(
            mac.library_path(Path::new("bin"), "prove"),
            PathBuf::from("bin/darwin-arm64-libprove.so")
        );

        let linux = HostPlatform::from_rust("linux", "x86_64");
        assert_eq!(
            linux.library_path(Path::new("/opt"), "verify"),
            PathBuf::from("/opt/linux-x86_64-libverify.so")
        );
    }

    #[test]
    fn test_missing_library_is_unsupported_platform() {
        let dir = tempfile::tempdir().unwrap();
        let host = HostPlatform::from_rust("linux", "riscv64");
        match NativeLibrary::load_for(dir.path(), host) {
            Err(ZkError::UnsupportedPlatform { platform, arch, path }) => {
                assert_eq!(platform, "linux");
                assert_eq!(arch, "riscv64");
                assert!(path.ends_with("linux-riscv64-libverify.so"));
            }
            Err(other) => panic!("expected UnsupportedPlatform, got {:?}", other),
            Ok(_) => panic!("loaded a library from an empty directory"),
        }
    }

    #[test]
    fn test_unloadable_library_is_incompatible() {
        let dir = tempfile::tempdir().unwrap();
        let host = HostPlatform::from_rust("linux", "x86_64");
        for kind in ["prove", "verify"] {
            std::fs::write(host.library_path(dir.path(), kind), b"not an ELF image").unwrap();
        }
        let err = NativeLibrary::load_for(dir.path(), host).err().unwrap();
        assert!(matches!(err, ZkError::IncompatibleBinary { .. }));
        assert!(err.is_platform_failure());
    }

    #[test]
    fn test_go_slice_layout() {
        let bytes = [9u8; 5];
        let slice = GoSlice::new(&bytes);
        assert_eq!(slice.len, 5);
        assert_eq!(slice.cap, 5);
        assert_eq!(slice.data, bytes.as_ptr().cast::<c_void>());
        assert_eq!(std::mem::size_of::<GoSlice<'_>>(), 3 * 8);
    }
}
