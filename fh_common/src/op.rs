/// Implements the standard arithmetic operator traits for a newtype wrapping an `i64`.
///
/// Usage:
/// * `op!(binary Foo, Add, add)` implements `Add<Foo> for Foo`.
/// * `op!(inplace Foo, SubAssign, sub_assign)` implements `SubAssign<Foo> for Foo`.
/// * `op!(unary Foo, Neg, neg)` implements `Neg for Foo`.
#[macro_export]
macro_rules! op {
    (binary $ty:ident, $trait:ident, $method:ident) => {
        impl $trait for $ty {
            type Output = Self;

            fn $method(self, rhs: Self) -> Self::Output {
                Self(self.0.$method(rhs.0))
            }
        }
    };
    (inplace $ty:ident, $trait:ident, $method:ident) => {
        impl $trait for $ty {
            fn $method(&mut self, rhs: Self) {
                self.0.$method(rhs.0)
            }
        }
    };
    (unary $ty:ident, $trait:ident, $method:ident) => {
        impl $trait for $ty {
            type Output = Self;

            fn $method(self) -> Self::Output {
                Self(self.0.$method())
            }
        }
    };
}
