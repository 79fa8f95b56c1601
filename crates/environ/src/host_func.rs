//! Host-implemented functions callable through the flat array protocol.
//!
//! A host function receives the same flat `u64` slot array the entry
//! trampolines use: parameters are read from the start of the array and
//! results are written back starting at the same base.

use crate::{WasmFuncType, WasmValType};
use core::fmt;
use std::sync::Arc;

/// A Rust type with a direct representation in the flat array.
pub trait WasmTy: Send + 'static {
    /// Number of 8-byte slots a value occupies.
    const SLOTS: usize = 1;

    /// The WebAssembly type of this Rust type.
    fn valtype() -> WasmValType;

    /// Reads a value from the start of `slots`.
    fn load(slots: &[u64]) -> Self;

    /// Writes this value to the start of `slots`.
    fn store(self, slots: &mut [u64]);
}

impl WasmTy for i32 {
    fn valtype() -> WasmValType {
        WasmValType::I32
    }
    fn load(slots: &[u64]) -> Self {
        slots[0] as u32 as i32
    }
    fn store(self, slots: &mut [u64]) {
        slots[0] = u64::from(self as u32);
    }
}

impl WasmTy for i64 {
    fn valtype() -> WasmValType {
        WasmValType::I64
    }
    fn load(slots: &[u64]) -> Self {
        slots[0] as i64
    }
    fn store(self, slots: &mut [u64]) {
        slots[0] = self as u64;
    }
}

impl WasmTy for f32 {
    fn valtype() -> WasmValType {
        WasmValType::F32
    }
    fn load(slots: &[u64]) -> Self {
        f32::from_bits(slots[0] as u32)
    }
    fn store(self, slots: &mut [u64]) {
        slots[0] = u64::from(self.to_bits());
    }
}

impl WasmTy for f64 {
    fn valtype() -> WasmValType {
        WasmValType::F64
    }
    fn load(slots: &[u64]) -> Self {
        f64::from_bits(slots[0])
    }
    fn store(self, slots: &mut [u64]) {
        slots[0] = self.to_bits();
    }
}

/// `v128` values travel as two little-endian 64-bit halves.
impl WasmTy for u128 {
    const SLOTS: usize = 2;

    fn valtype() -> WasmValType {
        WasmValType::V128
    }
    fn load(slots: &[u64]) -> Self {
        u128::from(slots[0]) | (u128::from(slots[1]) << 64)
    }
    fn store(self, slots: &mut [u64]) {
        slots[0] = self as u64;
        slots[1] = (self >> 64) as u64;
    }
}

/// Types that can be returned from a host function.
pub trait WasmRet: Send + 'static {
    /// The result types, in order.
    fn valtypes() -> Vec<WasmValType>;

    /// Writes the results to the start of `slots`.
    fn store(self, slots: &mut [u64]);
}

impl WasmRet for () {
    fn valtypes() -> Vec<WasmValType> {
        Vec::new()
    }
    fn store(self, _slots: &mut [u64]) {}
}

macro_rules! single_rets {
    ($($t:ty)*) => ($(
        impl WasmRet for $t {
            fn valtypes() -> Vec<WasmValType> {
                vec![<$t as WasmTy>::valtype()]
            }
            fn store(self, slots: &mut [u64]) {
                WasmTy::store(self, slots)
            }
        }
    )*)
}

single_rets!(i32 i64 f32 f64 u128);

impl<A: WasmTy, B: WasmTy> WasmRet for (A, B) {
    fn valtypes() -> Vec<WasmValType> {
        vec![A::valtype(), B::valtype()]
    }
    fn store(self, slots: &mut [u64]) {
        self.0.store(slots);
        self.1.store(&mut slots[A::SLOTS..]);
    }
}

type FlatFn = dyn Fn(&mut [u64]) + Send + Sync;

/// A host-implemented function together with its WebAssembly type.
#[derive(Clone)]
pub struct HostFunc {
    ty: WasmFuncType,
    func: Arc<FlatFn>,
}

impl HostFunc {
    /// Creates a host function of type `ty` operating directly on the flat
    /// array.
    pub fn new(ty: WasmFuncType, func: impl Fn(&mut [u64]) + Send + Sync + 'static) -> Self {
        Self {
            ty,
            func: Arc::new(func),
        }
    }

    /// Creates a host function from a closure, deriving the WebAssembly type
    /// from the closure's parameter and return types.
    pub fn wrap<Params, Results>(func: impl IntoHostFunc<Params, Results>) -> Self {
        func.into_host_func()
    }

    /// The function's type.
    pub fn ty(&self) -> &WasmFuncType {
        &self.ty
    }

    /// Invokes the function on a flat array.
    ///
    /// # Panics
    ///
    /// Panics if `slots` is shorter than the type's flat array length.
    pub fn call(&self, slots: &mut [u64]) {
        assert!(
            slots.len() >= self.ty.flat_array_len(),
            "flat array of {} slots is too short for {}",
            slots.len(),
            self.ty
        );
        (self.func)(slots)
    }
}

impl fmt::Debug for HostFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostFunc").field("ty", &self.ty).finish()
    }
}

/// Closures that can be turned into a [`HostFunc`].
pub trait IntoHostFunc<Params, Results>: Send + Sync + 'static {
    #[doc(hidden)]
    fn into_host_func(self) -> HostFunc;
}

macro_rules! impl_into_host_func {
    ($num:tt $($args:ident)*) => {
        #[allow(non_snake_case, unused_mut, unused_variables, unused_assignments)]
        impl<F, $($args,)* R> IntoHostFunc<($($args,)*), R> for F
        where
            F: Fn($($args),*) -> R + Send + Sync + 'static,
            $($args: WasmTy,)*
            R: WasmRet,
        {
            fn into_host_func(self) -> HostFunc {
                let params: Box<[WasmValType]> = Box::new([$($args::valtype(),)*]);
                let ty = WasmFuncType::new(params, R::valtypes().into_boxed_slice());
                HostFunc::new(ty, move |slots: &mut [u64]| {
                    let mut at = 0;
                    $(
                        let $args = $args::load(&slots[at..]);
                        at += $args::SLOTS;
                    )*
                    self($($args),*).store(slots);
                })
            }
        }
    };
}

macro_rules! for_each_function_signature {
    ($mac:ident) => {
        $mac!(0);
        $mac!(1 A1);
        $mac!(2 A1 A2);
        $mac!(3 A1 A2 A3);
        $mac!(4 A1 A2 A3 A4);
        $mac!(5 A1 A2 A3 A4 A5);
        $mac!(6 A1 A2 A3 A4 A5 A6);
        $mac!(7 A1 A2 A3 A4 A5 A6 A7);
        $mac!(8 A1 A2 A3 A4 A5 A6 A7 A8);
    };
}

for_each_function_signature!(impl_into_host_func);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_derives_type() {
        let f = HostFunc::wrap(|a: i32, b: i64| -> f64 { a as f64 + b as f64 });
        assert_eq!(f.ty(), &"i32, i64 -> f64".parse().unwrap());

        let f = HostFunc::wrap(|| {});
        assert_eq!(f.ty(), &WasmFuncType::default());

        let f = HostFunc::wrap(|v: u128, x: f32| -> (u128, f32) { (v, x) });
        assert_eq!(f.ty(), &"v128, f32 -> v128, f32".parse().unwrap());
    }

    #[test]
    fn call_reads_params_and_writes_results_from_base() {
        let add = HostFunc::wrap(|a: i32, b: i32| a.wrapping_add(b));
        let mut slots = [3, 4];
        add.call(&mut slots);
        assert_eq!(slots[0], 7);

        let neg = HostFunc::wrap(|a: i32| -a);
        let mut slots = [5];
        neg.call(&mut slots);
        assert_eq!(slots[0], u64::from((-5i32) as u32));
    }

    #[test]
    fn vector_values_span_two_slots() {
        let swap = HostFunc::wrap(|v: u128, x: i64| -> (i64, u128) { (x, v.rotate_left(64)) });
        let v: u128 = 0x1111_2222_3333_4444_5555_6666_7777_8888;
        let mut slots = [0u64; 3];
        WasmTy::store(v, &mut slots);
        WasmTy::store(-1i64, &mut slots[2..]);
        swap.call(&mut slots);
        assert_eq!(i64::load(&slots), -1);
        assert_eq!(u128::load(&slots[1..]), v.rotate_left(64));
    }

    #[test]
    #[should_panic(expected = "too short")]
    fn short_array_panics() {
        let f = HostFunc::wrap(|a: i64, b: i64| a + b);
        f.call(&mut [1]);
    }
}
