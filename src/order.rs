/// Operator precedence shared by both targets, tightest first.
///
/// A rendered child is wrapped in parentheses iff its order is looser than the
/// order its parent requested for that socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Order {
    Atomic,
    /// Member access, calls, `new`.
    Postfix,
    /// `!`, unary minus, casts.
    Unary,
    Multiplicative,
    /// Also string concatenation.
    Additive,
    Relational,
    Equality,
    LogicalAnd,
    LogicalOr,
    Conditional,
    Assignment,
    Comma,
    None,
}

impl Order {
    /// The next tighter level, used for operands that must not share their parent's level.
    pub fn tighter(self) -> Order {
        match self {
            Order::Atomic | Order::Postfix => Order::Atomic,
            Order::Unary => Order::Postfix,
            Order::Multiplicative => Order::Unary,
            Order::Additive => Order::Multiplicative,
            Order::Relational => Order::Additive,
            Order::Equality => Order::Relational,
            Order::LogicalAnd => Order::Equality,
            Order::LogicalOr => Order::LogicalAnd,
            Order::Conditional => Order::LogicalOr,
            Order::Assignment => Order::Conditional,
            Order::Comma => Order::Assignment,
            Order::None => Order::Comma,
        }
    }
}

pub fn needs_parens(inner: Order, outer: Order) -> bool {
    inner > outer
}

pub fn wrap(code: String, inner: Order, outer: Order) -> String {
    if needs_parens(inner, outer) {
        format!("({})", code)
    } else {
        code
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinaryOperator {
    pub symbol: &'static str,
    pub order: Order,
    /// Relational operators do not chain, so both sides bind tighter.
    pub chains: bool,
}

impl BinaryOperator {
    pub const fn new(symbol: &'static str, order: Order) -> Self {
        Self {
            symbol,
            order,
            chains: true,
        }
    }

    pub const fn non_chaining(symbol: &'static str, order: Order) -> Self {
        Self {
            symbol,
            order,
            chains: false,
        }
    }

    pub fn left_context(&self) -> Order {
        if self.chains {
            self.order
        } else {
            self.order.tighter()
        }
    }

    pub fn right_context(&self) -> Order {
        self.order.tighter()
    }
}
