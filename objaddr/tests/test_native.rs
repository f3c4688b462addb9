//! Resolution against the running test binary itself
#![cfg(any(unix, windows))]
#![allow(unsafe_code)] // `#[no_mangle]` marker function

use objaddr::{FramePtr, ModuleLocator, NativeLocator, NativeResolver};

#[no_mangle]
#[inline(never)]
pub extern "C" fn objaddr_native_marker() -> u64 {
    0x5eed
}

fn marker_address() -> FramePtr {
    FramePtr::from(objaddr_native_marker as usize)
}

#[test]
fn test_resolves_own_function_into_test_binary() {
    let frame = objaddr::global().resolve(marker_address());

    assert!(frame.is_resolved());
    assert_eq!(frame.raw_address, marker_address());
    let exe = std::env::current_exe().unwrap();
    assert_eq!(
        frame.object_path.file_name(),
        exe.file_name(),
        "resolved into {}",
        frame.object_path.display()
    );
}

#[test]
#[cfg(target_os = "linux")]
fn test_object_address_matches_symbol_table() {
    use object::{Object, ObjectSymbol};

    let exe = std::env::current_exe().unwrap();
    let data = std::fs::read(&exe).unwrap();
    let file = object::File::parse(&*data).unwrap();
    let symbol = file
        .symbols()
        .find(|symbol| symbol.name().ok() == Some("objaddr_native_marker"))
        .expect("marker symbol in test binary");

    let frame = objaddr::global().resolve(marker_address());

    assert_eq!(frame.object_address, symbol.address());
}

#[test]
fn test_safe_capture_matches_one_shot_natively() {
    let resolver = NativeResolver::native();
    let addresses = [marker_address(), FramePtr(0x10), FramePtr(0)];

    let captured = resolver.capture_safe_batch(&addresses);
    assert!(captured[0].is_resolved());
    assert!(!captured[1].is_resolved());
    assert!(!captured[2].is_resolved());

    assert_eq!(resolver.resolve_safe_batch(&captured), resolver.resolve_batch(&addresses));
}

#[test]
fn test_unmapped_address_is_not_located() {
    // Some platforms report "no module" as an OS error instead
    let locator = NativeLocator::default();
    assert!(!matches!(locator.locate(FramePtr(0x10)), Ok(Some(_))));
}

#[test]
fn test_runtime_base_not_above_address() {
    let module = NativeLocator::default().locate(marker_address()).unwrap().unwrap();
    assert!(module.runtime_base <= marker_address().get());
    assert!(!module.path.as_os_str().is_empty());
}

#[test]
#[cfg(target_os = "linux")]
fn test_memory_maps_agree_with_loader() {
    use objaddr::{MappedModules, ObjectFileBase, ObjectResolver};

    let maps = MappedModules::for_current_process().unwrap();
    let from_maps = ObjectResolver::new(maps, ObjectFileBase).resolve(marker_address());
    let from_loader = objaddr::global().resolve(marker_address());

    assert_eq!(from_maps.object_address, from_loader.object_address);
    assert_eq!(from_maps.object_path.file_name(), from_loader.object_path.file_name());
}

#[test]
fn test_concurrent_native_resolution() {
    let expected = objaddr::global().resolve(marker_address());

    std::thread::scope(|scope| {
        for _ in 0..8 {
            scope.spawn(|| {
                for _ in 0..100 {
                    assert_eq!(objaddr::global().resolve(marker_address()), expected);
                }
            });
        }
    });
}
