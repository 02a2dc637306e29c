use crate::ast::{Expr, LiteralValue};

/// Converts an expression to the Crafting‑Interpreters prefix form used by
/// the `parse` command, e.g. `(+ 1.0 (group 2.0))`.
pub struct AstPrinter;

impl AstPrinter {
    pub fn print(expr: &Expr) -> String {
        match expr {
            // ── literals ────────────────────────────────────────────────
            Expr::Literal(lit) => match lit {
                LiteralValue::True => "true".into(),

                LiteralValue::False => "false".into(),

                LiteralValue::Nil => "nil".into(),

                LiteralValue::Str(s) => s.clone(),

                LiteralValue::Number(n) => {
                    if n.fract() == 0.0 {
                        format!("{:.1}", n)
                    } else {
                        n.to_string()
                    }
                }
            },

            Expr::Grouping(inner) => format!("(group {})", Self::print(inner)),

            Expr::Unary { operator, right } => {
                format!("({} {})", operator.lexeme, Self::print(right))
            }

            Expr::Binary {
                left,
                operator,
                right,
            }
            | Expr::Logical {
                left,
                operator,
                right,
            } => format!(
                "({} {} {})",
                operator.lexeme,
                Self::print(left),
                Self::print(right)
            ),

            Expr::Conditional {
                condition,
                then_branch,
                else_branch,
            } => format!(
                "(?: {} {} {})",
                Self::print(condition),
                Self::print(then_branch),
                Self::print(else_branch)
            ),

            Expr::Variable { name, .. } => name.lexeme.clone(),

            Expr::This { .. } => "this".into(),

            Expr::Assign { name, value, .. } => {
                format!("(= {} {})", name.lexeme, Self::print(value))
            }

            Expr::Call {
                callee, arguments, ..
            } => Self::parenthesize("call", std::iter::once(&**callee).chain(arguments)),

            Expr::Get { object, name } => format!("(. {} {})", Self::print(object), name.lexeme),

            Expr::Set {
                object,
                name,
                value,
            } => format!(
                "(= (. {} {}) {})",
                Self::print(object),
                name.lexeme,
                Self::print(value)
            ),

            Expr::Array { elements } => Self::parenthesize("array", elements.iter()),

            Expr::ArrayAccess { target, index, .. } => {
                format!("(index {} {})", Self::print(target), Self::print(index))
            }
        }
    }

    fn parenthesize<'e>(head: &str, parts: impl Iterator<Item = &'e Expr>) -> String {
        let mut s = format!("({}", head);
        for part in parts {
            s.push(' ');
            s.push_str(&Self::print(part));
        }
        s.push(')');
        s
    }
}
