/// Implements a basic `Debug` trait for generic stream types using their type name.
///
/// Streams and subjects hold closures, so there is nothing useful to print beyond
/// the type itself.
#[macro_export]
macro_rules! impl_debug {
    ($ty:ident) => {
        impl<T> core::fmt::Debug for $ty<T> {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(core::any::type_name::<Self>())
            }
        }
    };
}
