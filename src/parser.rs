/*!
Recursive‑descent parser for Rox.

Time & Space
------------
Each token is consumed once via `advance()`, so parsing is **Θ(n)** in the
number of tokens.  The AST holds one `Box` per interior node; call‑stack depth
grows with syntactic nesting.

### Logging Policy

| Location                     | Level  | Purpose                                   |
|------------------------------|--------|-------------------------------------------|
| `Parser::new`, `parse`       | `info` | Lifecycle milestones.                     |
| `declaration`, `statement`   | `debug`| High‑level descent into grammar branches. |
| Error paths (`consume`, etc.)| `debug`| Context before returning structured error.|

Grammar (EBNF)
--------------

```text
program        → declaration* EOF ;
declaration    → importDecl | exportDecl | classDecl | funDecl | varDecl | statement ;
importDecl     → "import" STRING ";" ;
exportDecl     → "export" ( classDecl | funDecl | varDecl ) ;
classDecl      → "class" IDENT "{" ( "class"? method )* "}" ;
method         → IDENT ( "(" parameters? ")" )? block ;      // no list ⇒ getter
funDecl        → "fun" IDENT "(" parameters? ")" block ;
varDecl        → "var" IDENT ( "=" expression )? ";" ;
statement      → exprStmt | printStmt | whileStmt | forStmt | breakStmt
               | ifStmt | block | returnStmt ;
forStmt        → "for" "(" ( varDecl | exprStmt | ";" ) expression? ";" expression? ")" statement ;
breakStmt      → "break" ";" ;
expression     → assignment ;
assignment     → ( call "." )? IDENT "=" assignment | logic_or ;
logic_or       → logic_and ( ( "or" | "||" ) logic_and )* ;
logic_and      → comma ( ( "and" | "&&" ) comma )* ;
comma          → conditional ( "," conditional )* ;
conditional    → equality ( "?" expression ":" conditional )? ;
equality       → comparison ( ( "!=" | "==" ) comparison )* ;
comparison     → term ( ( ">" | ">=" | "<" | "<=" ) term )* ;
term           → factor ( ( "-" | "+" ) factor )* ;
factor         → unary ( ( "/" | "*" | "%" | "|" | "^" ) unary )* ;
unary          → ( "!" | "-" ) unary | call ;
call           → primary ( "(" arguments? ")" | "." IDENT | "[" expression "]" )* ;
arguments      → conditional ( "," conditional )* ;
primary        → NUMBER | STRING | "true" | "false" | "nil" | "this"
               | IDENT | "(" expression ")" | "[" arguments? "]" ;
```

`for` is desugared here, once, into `{ init; while (cond) { body; incr; } }`.
*/

use std::rc::Rc;

use crate::ast::{ClassDecl, Expr, ExprId, FunctionDecl, LiteralValue, Stmt};
use crate::error::{LoxError, Result};
use crate::token::{Token, TokenType};

use log::{debug, info};

const MAX_ARGS: usize = 255;

/// What a REPL line turned out to be.
#[derive(Debug)]
pub enum ReplInput {
    /// Ordinary declarations/statements.
    Statements(Vec<Stmt>),

    /// A trailing bare expression (no `;`) whose value should be echoed.
    Expression(Expr),
}

/// Top‑level parser over a scanned token vector (which must end in `EOF`).
pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    allow_expression: bool,
    found_expression: bool,
}

impl Parser {
    /// Construct a new parser.
    pub fn new(tokens: Vec<Token>) -> Self {
        info!("Parser created with {} tokens", tokens.len());

        let mut tokens = tokens;
        if !matches!(tokens.last(), Some(t) if t.token_type == TokenType::EOF) {
            let line = tokens.last().map_or(1, |t| t.line);
            tokens.push(Token::new(TokenType::EOF, "", line));
        }

        Self {
            tokens,
            current: 0,
            allow_expression: false,
            found_expression: false,
        }
    }

    // ───────────────────────── public API ─────────────────────────

    /// Parse an entire program and return its statement list.  On failure the
    /// parser synchronises and keeps going so later errors are logged, then
    /// the first error is returned.
    pub fn parse(&mut self) -> Result<Vec<Stmt>> {
        info!("Beginning parse phase");

        let mut statements: Vec<Stmt> = Vec::new();
        let mut first_error: Option<LoxError> = None;

        while !self.is_at_end() {
            match self.declaration() {
                Ok(stmt) => statements.push(stmt),
                Err(e) => {
                    debug!("Parse error: {}", e);
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(statements),
        }
    }

    /// Parse a single expression (used by the `evaluate` and `parse` commands).
    pub fn parse_expression(&mut self) -> Result<Expr> {
        info!("Parsing a single expression");

        let expr: Expr = self.expression()?;

        if !self.is_at_end() {
            return Err(LoxError::parse(self.peek(), "Expected end of expression."));
        }

        Ok(expr)
    }

    /// Parse a REPL line.  A final expression statement may omit its `;`, in
    /// which case the expression itself is returned for echoing.
    pub fn parse_repl(&mut self) -> Result<ReplInput> {
        self.allow_expression = true;

        let mut statements: Vec<Stmt> = Vec::new();

        while !self.is_at_end() {
            let stmt: Stmt = self.declaration()?;

            if self.found_expression {
                if let Stmt::Expression(expr) = stmt {
                    return Ok(ReplInput::Expression(expr));
                }
            }

            statements.push(stmt);
        }

        Ok(ReplInput::Statements(statements))
    }

    // ──────────────────────── declaration rules ───────────────────

    fn declaration(&mut self) -> Result<Stmt> {
        debug!("Entering declaration");

        let result = if self.matches(TokenType::IMPORT) {
            self.import_declaration()
        } else if self.matches(TokenType::EXPORT) {
            self.export_declaration()
        } else if self.matches(TokenType::CLASS) {
            self.class_declaration()
        } else if self.matches(TokenType::FUN) {
            self.function("function").map(Stmt::Function)
        } else if self.matches(TokenType::VAR) {
            self.var_declaration()
        } else {
            self.statement()
        };

        if result.is_err() {
            self.synchronize();
        }

        result
    }

    fn import_declaration(&mut self) -> Result<Stmt> {
        let keyword: Token = self.previous().clone();

        if !matches!(self.peek().token_type, TokenType::STRING(_)) {
            return Err(LoxError::parse(self.peek(), "Expected string after 'import'."));
        }

        let path: Token = self.advance().clone();

        self.consume(TokenType::SEMICOLON, "Expected ';' after import statement.")?;

        Ok(Stmt::Import { keyword, path })
    }

    fn export_declaration(&mut self) -> Result<Stmt> {
        let keyword: Token = self.previous().clone();

        let declaration: Stmt = if self.matches(TokenType::CLASS) {
            self.class_declaration()?
        } else if self.matches(TokenType::FUN) {
            Stmt::Function(self.function("function")?)
        } else if self.matches(TokenType::VAR) {
            self.var_declaration()?
        } else {
            return Err(LoxError::parse(
                self.peek(),
                "Can only export variable, function, or class declarations.",
            ));
        };

        Ok(Stmt::Export {
            keyword,
            declaration: Box::new(declaration),
        })
    }

    fn class_declaration(&mut self) -> Result<Stmt> {
        let name: Token = self.consume(TokenType::IDENTIFIER, "Expected class name.")?;

        self.consume(TokenType::LEFT_BRACE, "Expected '{' before class body.")?;

        let mut methods: Vec<Rc<FunctionDecl>> = Vec::new();
        let mut class_methods: Vec<Rc<FunctionDecl>> = Vec::new();

        while !self.check(TokenType::RIGHT_BRACE) && !self.is_at_end() {
            if self.matches(TokenType::CLASS) {
                class_methods.push(self.function("method")?);
            } else {
                methods.push(self.function("method")?);
            }
        }

        self.consume(TokenType::RIGHT_BRACE, "Expected '}' after class body.")?;

        Ok(Stmt::Class(Rc::new(ClassDecl {
            name,
            methods,
            class_methods,
        })))
    }

    /// `kind` is `"function"` or `"method"`; only methods may omit the
    /// parameter list (getters).
    fn function(&mut self, kind: &str) -> Result<Rc<FunctionDecl>> {
        let name: Token =
            self.consume(TokenType::IDENTIFIER, &format!("Expected {} name.", kind))?;

        let mut params: Option<Vec<Token>> = None;

        if kind != "method" || self.check(TokenType::LEFT_PAREN) {
            self.consume(
                TokenType::LEFT_PAREN,
                &format!("Expected '(' after {} name.", kind),
            )?;

            let mut list: Vec<Token> = Vec::new();

            if !self.check(TokenType::RIGHT_PAREN) {
                loop {
                    if list.len() >= MAX_ARGS {
                        return Err(LoxError::parse(
                            self.peek(),
                            "Can't have more than 255 parameters.",
                        ));
                    }

                    list.push(self.consume(TokenType::IDENTIFIER, "Expected parameter name.")?);

                    if !self.matches(TokenType::COMMA) {
                        break;
                    }
                }
            }

            self.consume(TokenType::RIGHT_PAREN, "Expected ')' after parameters.")?;
            params = Some(list);
        }

        self.consume(
            TokenType::LEFT_BRACE,
            &format!("Expected '{{' before {} body.", kind),
        )?;

        let body: Vec<Stmt> = self.block()?;

        Ok(Rc::new(FunctionDecl { name, params, body }))
    }

    fn var_declaration(&mut self) -> Result<Stmt> {
        let name: Token = self.consume(TokenType::IDENTIFIER, "Expected variable name.")?;

        let initializer: Option<Expr> = if self.matches(TokenType::EQUAL) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(
            TokenType::SEMICOLON,
            "Expected ';' after variable declaration.",
        )?;

        Ok(Stmt::Var { name, initializer })
    }

    // ───────────────────────── statement rules ────────────────────

    fn statement(&mut self) -> Result<Stmt> {
        debug!("Entering statement");

        if self.matches(TokenType::BREAK) {
            self.break_statement()
        } else if self.matches(TokenType::FOR) {
            self.for_statement()
        } else if self.matches(TokenType::IF) {
            self.if_statement()
        } else if self.matches(TokenType::WHILE) {
            self.while_statement()
        } else if self.matches(TokenType::RETURN) {
            self.return_statement()
        } else if self.matches(TokenType::LEFT_BRACE) {
            Ok(Stmt::Block(self.block()?))
        } else if self.matches(TokenType::PRINT) {
            self.print_statement()
        } else {
            self.expression_statement()
        }
    }

    fn break_statement(&mut self) -> Result<Stmt> {
        let keyword: Token = self.previous().clone();

        self.consume(TokenType::SEMICOLON, "Expected ';' after 'break'.")?;

        Ok(Stmt::Break { keyword })
    }

    fn for_statement(&mut self) -> Result<Stmt> {
        self.consume(TokenType::LEFT_PAREN, "Expected '(' after 'for'.")?;

        let initializer: Option<Stmt> = if self.matches(TokenType::SEMICOLON) {
            None
        } else if self.matches(TokenType::VAR) {
            Some(self.var_declaration()?)
        } else {
            Some(self.expression_statement()?)
        };

        let condition: Option<Expr> = if !self.check(TokenType::SEMICOLON) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(TokenType::SEMICOLON, "Expected ';' after loop condition.")?;

        let increment: Option<Expr> = if !self.check(TokenType::RIGHT_PAREN) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(TokenType::RIGHT_PAREN, "Expected ')' after for clauses.")?;

        let mut body: Stmt = self.statement()?;

        if let Some(increment) = increment {
            body = Stmt::Block(vec![body, Stmt::Expression(increment)]);
        }

        body = Stmt::While {
            condition: condition.unwrap_or(Expr::Literal(LiteralValue::True)),
            body: Box::new(body),
        };

        if let Some(initializer) = initializer {
            body = Stmt::Block(vec![initializer, body]);
        }

        Ok(body)
    }

    fn print_statement(&mut self) -> Result<Stmt> {
        let value: Expr = self.expression()?;

        self.consume(TokenType::SEMICOLON, "Expected ';' after value.")?;

        Ok(Stmt::Print(value))
    }

    fn expression_statement(&mut self) -> Result<Stmt> {
        let expr: Expr = self.expression()?;

        if self.allow_expression && self.is_at_end() {
            self.found_expression = true;
        } else {
            self.consume(TokenType::SEMICOLON, "Expected ';' after expression.")?;
        }

        Ok(Stmt::Expression(expr))
    }

    fn if_statement(&mut self) -> Result<Stmt> {
        self.consume(TokenType::LEFT_PAREN, "Expected '(' after 'if'.")?;
        let condition: Expr = self.expression()?;
        self.consume(TokenType::RIGHT_PAREN, "Expected ')' after if condition.")?;

        let then_branch: Box<Stmt> = Box::new(self.statement()?);
        let else_branch: Option<Box<Stmt>> = if self.matches(TokenType::ELSE) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };

        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    fn while_statement(&mut self) -> Result<Stmt> {
        self.consume(TokenType::LEFT_PAREN, "Expected '(' after 'while'.")?;
        let condition: Expr = self.expression()?;
        self.consume(TokenType::RIGHT_PAREN, "Expected ')' after condition.")?;
        let body: Box<Stmt> = Box::new(self.statement()?);

        Ok(Stmt::While { condition, body })
    }

    fn return_statement(&mut self) -> Result<Stmt> {
        let keyword: Token = self.previous().clone();
        let value: Option<Expr> = if !self.check(TokenType::SEMICOLON) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(TokenType::SEMICOLON, "Expected ';' after return value.")?;

        Ok(Stmt::Return { keyword, value })
    }

    fn block(&mut self) -> Result<Vec<Stmt>> {
        let mut statements: Vec<Stmt> = Vec::new();

        while !self.check(TokenType::RIGHT_BRACE) && !self.is_at_end() {
            statements.push(self.declaration()?);
        }

        self.consume(TokenType::RIGHT_BRACE, "Expected '}' after block.")?;

        Ok(statements)
    }

    // ─────────────────────── expression rules ─────────────────────

    fn expression(&mut self) -> Result<Expr> {
        self.assignment()
    }

    fn assignment(&mut self) -> Result<Expr> {
        let expr: Expr = self.logical_or()?;

        if self.matches(TokenType::EQUAL) {
            let equals: Token = self.previous().clone();
            let value: Expr = self.assignment()?;

            return match expr {
                Expr::Variable { name, .. } => Ok(Expr::Assign {
                    id: ExprId::fresh(),
                    name,
                    value: Box::new(value),
                }),

                Expr::Get { object, name } => Ok(Expr::Set {
                    object,
                    name,
                    value: Box::new(value),
                }),

                _ => Err(LoxError::parse(&equals, "Invalid assignment target.")),
            };
        }

        Ok(expr)
    }

    fn logical_or(&mut self) -> Result<Expr> {
        let mut expr: Expr = self.logical_and()?;

        while self.matches(TokenType::OR) {
            let operator: Token = self.previous().clone();
            let right: Expr = self.logical_and()?;

            expr = Expr::Logical {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn logical_and(&mut self) -> Result<Expr> {
        let mut expr: Expr = self.comma()?;

        while self.matches(TokenType::AND) {
            let operator: Token = self.previous().clone();
            let right: Expr = self.comma()?;

            expr = Expr::Logical {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn comma(&mut self) -> Result<Expr> {
        let mut expr: Expr = self.conditional()?;

        while self.matches(TokenType::COMMA) {
            let operator: Token = self.previous().clone();
            let right: Expr = self.conditional()?;

            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn conditional(&mut self) -> Result<Expr> {
        let expr: Expr = self.equality()?;

        if self.matches(TokenType::QUESTION) {
            let then_branch: Expr = self.expression()?;

            self.consume(
                TokenType::COLON,
                "Expected ':' after then branch of conditional expression.",
            )?;

            let else_branch: Expr = self.conditional()?;

            return Ok(Expr::Conditional {
                condition: Box::new(expr),
                then_branch: Box::new(then_branch),
                else_branch: Box::new(else_branch),
            });
        }

        Ok(expr)
    }

    /// Left‑associative binary level: `next ( op next )*` for any of `ops`.
    fn binary_level(
        &mut self,
        ops: &[TokenType],
        next: fn(&mut Self) -> Result<Expr>,
    ) -> Result<Expr> {
        let mut expr: Expr = next(self)?;

        while self.matches_any(ops) {
            let operator: Token = self.previous().clone();
            let right: Expr = next(self)?;

            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn equality(&mut self) -> Result<Expr> {
        self.binary_level(
            &[TokenType::BANG_EQUAL, TokenType::EQUAL_EQUAL],
            Self::comparison,
        )
    }

    fn comparison(&mut self) -> Result<Expr> {
        self.binary_level(
            &[
                TokenType::GREATER,
                TokenType::GREATER_EQUAL,
                TokenType::LESS,
                TokenType::LESS_EQUAL,
            ],
            Self::term,
        )
    }

    fn term(&mut self) -> Result<Expr> {
        self.binary_level(&[TokenType::MINUS, TokenType::PLUS], Self::factor)
    }

    fn factor(&mut self) -> Result<Expr> {
        self.binary_level(
            &[
                TokenType::SLASH,
                TokenType::STAR,
                TokenType::PERCENT,
                TokenType::BAR,
                TokenType::XOR,
            ],
            Self::unary,
        )
    }

    fn unary(&mut self) -> Result<Expr> {
        if self.matches(TokenType::BANG) || self.matches(TokenType::MINUS) {
            let operator: Token = self.previous().clone();
            let right: Expr = self.unary()?;

            return Ok(Expr::Unary {
                operator,
                right: Box::new(right),
            });
        }

        self.call()
    }

    fn call(&mut self) -> Result<Expr> {
        let mut expr: Expr = self.primary()?;

        loop {
            if self.matches(TokenType::LEFT_PAREN) {
                expr = self.finish_call(expr)?;
            } else if self.matches(TokenType::DOT) {
                let name: Token =
                    self.consume(TokenType::IDENTIFIER, "Expected property name after '.'.")?;

                expr = Expr::Get {
                    object: Box::new(expr),
                    name,
                };
            } else if self.matches(TokenType::LEFT_BRACKET) {
                let index: Expr = self.expression()?;
                let bracket: Token =
                    self.consume(TokenType::RIGHT_BRACKET, "Expected ']' after array index.")?;

                expr = Expr::ArrayAccess {
                    target: Box::new(expr),
                    bracket,
                    index: Box::new(index),
                };
            } else {
                break;
            }
        }

        Ok(expr)
    }

    /// Comma separated list parsed at `conditional` level, so the comma
    /// operator never swallows neighbouring items.
    fn list_until(&mut self, close: TokenType) -> Result<Vec<Expr>> {
        let mut items: Vec<Expr> = Vec::new();

        if !self.check(close) {
            loop {
                if items.len() >= MAX_ARGS {
                    return Err(LoxError::parse(
                        self.peek(),
                        "Can't have more than 255 arguments.",
                    ));
                }

                items.push(self.conditional()?);

                if !self.matches(TokenType::COMMA) {
                    break;
                }
            }
        }

        Ok(items)
    }

    fn finish_call(&mut self, callee: Expr) -> Result<Expr> {
        let arguments: Vec<Expr> = self.list_until(TokenType::RIGHT_PAREN)?;
        let paren: Token = self.consume(TokenType::RIGHT_PAREN, "Expected ')' after arguments.")?;

        Ok(Expr::Call {
            callee: Box::new(callee),
            paren,
            arguments,
        })
    }

    fn primary(&mut self) -> Result<Expr> {
        if self.matches(TokenType::FALSE) {
            return Ok(Expr::Literal(LiteralValue::False));
        }
        if self.matches(TokenType::TRUE) {
            return Ok(Expr::Literal(LiteralValue::True));
        }
        if self.matches(TokenType::NIL) {
            return Ok(Expr::Literal(LiteralValue::Nil));
        }

        match &self.peek().token_type {
            TokenType::NUMBER(n) => {
                let n: f64 = *n;
                self.advance();
                return Ok(Expr::Literal(LiteralValue::Number(n)));
            }
            TokenType::STRING(s) => {
                let s: String = s.clone();
                self.advance();
                return Ok(Expr::Literal(LiteralValue::Str(s)));
            }
            _ => {}
        }

        if self.matches(TokenType::THIS) {
            return Ok(Expr::This {
                id: ExprId::fresh(),
                keyword: self.previous().clone(),
            });
        }

        if self.matches(TokenType::IDENTIFIER) {
            return Ok(Expr::Variable {
                id: ExprId::fresh(),
                name: self.previous().clone(),
            });
        }

        if self.matches(TokenType::LEFT_PAREN) {
            let expr: Expr = self.expression()?;

            self.consume(TokenType::RIGHT_PAREN, "Expected ')' after expression.")?;

            return Ok(Expr::Grouping(Box::new(expr)));
        }

        if self.matches(TokenType::LEFT_BRACKET) {
            let elements: Vec<Expr> = self.list_until(TokenType::RIGHT_BRACKET)?;

            self.consume(TokenType::RIGHT_BRACKET, "Expected ']' after array elements.")?;

            return Ok(Expr::Array { elements });
        }

        // A binary operator with nothing on its left.
        if self.matches_any(&[
            TokenType::BANG_EQUAL,
            TokenType::EQUAL_EQUAL,
            TokenType::GREATER,
            TokenType::GREATER_EQUAL,
            TokenType::LESS,
            TokenType::LESS_EQUAL,
            TokenType::PLUS,
            TokenType::SLASH,
            TokenType::STAR,
            TokenType::PERCENT,
        ]) {
            return Err(LoxError::parse(self.previous(), "Missing left-hand operand."));
        }

        debug!("No expression at {:?}", self.peek());

        Err(LoxError::parse(self.peek(), "Expected expression."))
    }

    // ────────────────────── utility helpers ───────────────────────

    #[inline(always)]
    fn matches(&mut self, ttype: TokenType) -> bool {
        if self.check(ttype) {
            self.advance();

            return true;
        }

        false
    }

    fn matches_any(&mut self, types: &[TokenType]) -> bool {
        if types.iter().any(|t| self.check(t.clone())) {
            self.advance();

            return true;
        }

        false
    }

    #[inline(always)]
    fn consume(&mut self, ttype: TokenType, message: &str) -> Result<Token> {
        if self.check(ttype) {
            return Ok(self.advance().clone());
        }

        debug!("consume failed at {:?}: {}", self.peek(), message);

        Err(LoxError::parse(self.peek(), message))
    }

    #[inline(always)]
    fn check(&self, ttype: TokenType) -> bool {
        if self.is_at_end() {
            return false;
        }

        self.peek().token_type == ttype
    }

    #[inline(always)]
    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }

        self.previous()
    }

    #[inline(always)]
    fn is_at_end(&self) -> bool {
        matches!(self.peek().token_type, TokenType::EOF)
    }

    #[inline(always)]
    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    #[inline(always)]
    fn previous(&self) -> &Token {
        &self.tokens[self.current.saturating_sub(1)]
    }

    /// Discards tokens until it thinks it is at a statement boundary.
    fn synchronize(&mut self) {
        self.advance();

        while !self.is_at_end() {
            if matches!(self.previous().token_type, TokenType::SEMICOLON) {
                return;
            }

            match self.peek().token_type {
                TokenType::CLASS
                | TokenType::FUN
                | TokenType::VAR
                | TokenType::FOR
                | TokenType::IF
                | TokenType::WHILE
                | TokenType::PRINT
                | TokenType::RETURN
                | TokenType::IMPORT
                | TokenType::EXPORT => return,
                _ => {}
            }

            self.advance();
        }
    }
}
