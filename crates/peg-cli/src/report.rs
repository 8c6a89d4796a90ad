//! Renders a grammar-load failure for the terminal. `peg_core::Error`
//! already implements the `file:line:col` + caret format (§7); this just
//! gives the CLI one place to extend that rendering later (e.g. color)
//! without main.rs reaching into `peg_core::Error`'s fields directly.

use peg_core::Error;

pub fn render(err: &Error) -> String {
    err.to_string()
}
