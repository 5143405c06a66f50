use std::hash::Hasher;

/// A hasher optimized for hashing component type IDs.
#[derive(Default)]
pub struct ComponentTypeIdHasher(u64);

impl Hasher for ComponentTypeIdHasher {
    fn finish(&self) -> u64 {
        self.0
    }

    fn write(&mut self, bytes: &[u8]) {
        // TypeId is already a high-quality hash; fold its bytes together.
        for chunk in bytes.chunks(8) {
            let mut buf = [0u8; 8];
            buf[..chunk.len()].copy_from_slice(chunk);
            self.0 ^= u64::from_ne_bytes(buf);
        }
    }
}

/// A hasher optimized for handle keys, whose bytes are already uniformly
/// random.
#[derive(Default)]
pub struct HandleHasher(u64);

impl Hasher for HandleHasher {
    fn finish(&self) -> u64 {
        self.0
    }

    fn write(&mut self, bytes: &[u8]) {
        // Any eight bytes of a generated handle are as good as a hash.
        let mut buf = [0u8; 8];
        let len = bytes.len().min(8);
        buf[..len].copy_from_slice(&bytes[..len]);
        self.0 = u64::from_ne_bytes(buf);
    }
}

#[test]
fn hasher() {
    use core::any::TypeId;
    use core::hash::Hash;

    fn hash_of<T: 'static + ?Sized>() -> u64 {
        let mut hasher = ComponentTypeIdHasher::default();
        TypeId::of::<T>().hash(&mut hasher);
        hasher.finish()
    }

    assert_eq!(hash_of::<usize>(), hash_of::<usize>());
    assert_ne!(hash_of::<usize>(), hash_of::<()>());
    assert_ne!(hash_of::<str>(), hash_of::<&'static str>());
}

#[test]
fn handle_hasher_folds_leading_bytes() {
    let mut a = HandleHasher::default();
    a.write(b"0123456789abcdef0123456789abcdef");
    let mut b = HandleHasher::default();
    b.write(b"01234567xxxxxxxxxxxxxxxxxxxxxxxx");
    assert_eq!(a.finish(), b.finish());

    let mut c = HandleHasher::default();
    c.write(b"7654321089abcdef0123456789abcdef");
    assert_ne!(a.finish(), c.finish());
}
