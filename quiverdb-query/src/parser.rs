use crate::ast::*;
use crate::error::{Error, Result};
use crate::lexer::{Lexer, Token, TokenType};

pub struct Parser;

impl Parser {
    pub fn parse(input: &str) -> Result<Query> {
        let tokens = Lexer::new(input).tokenize()?;
        let mut parser = TokenParser::new(tokens);
        parser.parse_query()
    }
}

struct TokenParser {
    tokens: Vec<Token>,
    position: usize,
}

impl TokenParser {
    // Pratt parser binding powers (higher = tighter binding).
    const BP_OR: u8 = 10;
    const BP_AND: u8 = 20;
    const BP_NOT: u8 = 30;
    const BP_CMP: u8 = 40;
    const BP_ADD: u8 = 50;
    const BP_MUL: u8 = 60;
    const BP_PREFIX: u8 = 70;

    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            position: 0,
        }
    }

    fn parse_query(&mut self) -> Result<Query> {
        let mut clauses = Vec::new();
        while !self.is_at_end() {
            clauses.push(self.parse_clause()?);
        }
        if clauses.is_empty() {
            return Err(Error::Parse {
                offset: 0,
                message: "empty query".to_string(),
            });
        }
        Ok(Query { clauses })
    }

    fn parse_clause(&mut self) -> Result<Clause> {
        if self.match_token(&TokenType::Match) {
            return Ok(Clause::Match(MatchClause {
                patterns: self.parse_pattern_list()?,
            }));
        }
        if self.match_token(&TokenType::Where) {
            return Ok(Clause::Where(WhereClause {
                expression: self.parse_expression()?,
            }));
        }
        if self.match_token(&TokenType::Create) {
            return Ok(Clause::Create(CreateClause {
                patterns: self.parse_pattern_list()?,
            }));
        }
        if self.match_token(&TokenType::Delete) {
            return Ok(Clause::Delete(self.parse_delete()?));
        }
        if self.match_token(&TokenType::With) {
            let distinct = self.match_token(&TokenType::Distinct);
            return Ok(Clause::With(WithClause {
                distinct,
                items: self.parse_projection_list()?,
            }));
        }
        if self.match_token(&TokenType::Return) {
            let distinct = self.match_token(&TokenType::Distinct);
            return Ok(Clause::Return(ReturnClause {
                distinct,
                items: self.parse_projection_list()?,
            }));
        }
        if self.match_token(&TokenType::Order) {
            self.consume(&TokenType::By, "expected BY after ORDER")?;
            return Ok(Clause::OrderBy(self.parse_order_by()?));
        }
        if self.match_token(&TokenType::Skip) {
            return Ok(Clause::Skip(self.parse_count("SKIP")?));
        }
        if self.match_token(&TokenType::Limit) {
            return Ok(Clause::Limit(self.parse_count("LIMIT")?));
        }

        Err(self.error_here(format!(
            "unexpected token {:?}",
            self.peek().token_type
        )))
    }

    fn parse_pattern_list(&mut self) -> Result<Vec<Pattern>> {
        let mut patterns = Vec::new();
        patterns.push(self.parse_pattern()?);
        while self.match_token(&TokenType::Comma) {
            patterns.push(self.parse_pattern()?);
        }
        Ok(patterns)
    }

    fn parse_pattern(&mut self) -> Result<Pattern> {
        let mut elements = Vec::new();
        elements.push(PathElement::Node(self.parse_node_pattern()?));
        while self.check_relationship_start() {
            elements.push(PathElement::Relationship(self.parse_rel_pattern()?));
            elements.push(PathElement::Node(self.parse_node_pattern()?));
        }
        Ok(Pattern { elements })
    }

    fn check_relationship_start(&self) -> bool {
        matches!(
            self.peek().token_type,
            TokenType::LeftArrow | TokenType::Dash | TokenType::RightArrow
        )
    }

    fn parse_node_pattern(&mut self) -> Result<NodePattern> {
        self.consume(&TokenType::LeftParen, "expected '('")?;
        let variable = if self.peek_is_identifier() {
            Some(self.parse_identifier("node variable")?)
        } else {
            None
        };

        let mut labels = Vec::new();
        while self.match_token(&TokenType::Colon) {
            labels.push(self.parse_identifier("node label")?);
        }

        let properties = if self.check(&TokenType::LeftBrace) {
            Some(self.parse_property_map()?)
        } else {
            None
        };

        self.consume(&TokenType::RightParen, "expected ')'")?;
        Ok(NodePattern {
            variable,
            labels,
            properties,
        })
    }

    fn parse_rel_pattern(&mut self) -> Result<RelPattern> {
        let mut direction = if self.match_token(&TokenType::LeftArrow) {
            RelDirection::Incoming
        } else if self.match_token(&TokenType::Dash) {
            RelDirection::Undirected
        } else if self.match_token(&TokenType::RightArrow) {
            // Bare `->` with no bracket body.
            return Ok(RelPattern {
                variable: None,
                types: Vec::new(),
                direction: RelDirection::Outgoing,
                range: None,
                properties: None,
            });
        } else {
            return Err(self.error_here("expected relationship start".to_string()));
        };

        let mut variable = None;
        let mut types = Vec::new();
        let mut range = None;
        let mut properties = None;

        if self.match_token(&TokenType::LeftBracket) {
            if self.peek_is_identifier() {
                variable = Some(self.parse_identifier("relationship variable")?);
            }

            if self.match_token(&TokenType::Colon) {
                loop {
                    types.push(self.parse_identifier("relationship type")?);
                    if !self.match_token(&TokenType::Pipe) {
                        break;
                    }
                }
            }

            if self.match_token(&TokenType::Asterisk) {
                range = Some(self.parse_hop_range()?);
            }

            if self.check(&TokenType::LeftBrace) {
                properties = Some(self.parse_property_map()?);
            }

            self.consume(&TokenType::RightBracket, "expected ']'")?;
        }

        if self.match_token(&TokenType::RightArrow) {
            direction = if direction == RelDirection::Incoming {
                RelDirection::Undirected
            } else {
                RelDirection::Outgoing
            };
        } else if self.match_token(&TokenType::Dash) {
            // Keep the current direction.
        } else if direction == RelDirection::Incoming {
            self.consume(&TokenType::Dash, "expected '-'")?;
        }

        Ok(RelPattern {
            variable,
            types,
            direction,
            range,
            properties,
        })
    }

    fn parse_hop_range(&mut self) -> Result<HopRange> {
        let mut min = None;
        let mut max = None;
        if matches!(self.peek().token_type, TokenType::Integer(_)) {
            let n = self.parse_count("path length")? as u32;
            min = Some(n);
            if self.match_token(&TokenType::RangeDots) {
                if matches!(self.peek().token_type, TokenType::Integer(_)) {
                    max = Some(self.parse_count("path length")? as u32);
                }
            } else {
                max = Some(n);
            }
            return Ok(HopRange { min, max });
        }
        if self.match_token(&TokenType::RangeDots)
            && matches!(self.peek().token_type, TokenType::Integer(_))
        {
            max = Some(self.parse_count("path length")? as u32);
        }
        Ok(HopRange { min, max })
    }

    fn parse_property_map(&mut self) -> Result<PropertyMap> {
        self.consume(&TokenType::LeftBrace, "expected '{'")?;
        let mut entries = Vec::new();

        while !self.check(&TokenType::RightBrace) {
            let key = self.parse_identifier("property key")?;
            self.consume(&TokenType::Colon, "expected ':' in property map")?;
            let value = self.parse_expression()?;
            entries.push(PropertyPair { key, value });

            if !self.match_token(&TokenType::Comma) {
                break;
            }
        }

        self.consume(&TokenType::RightBrace, "expected '}'")?;
        Ok(PropertyMap { entries })
    }

    fn parse_delete(&mut self) -> Result<DeleteClause> {
        let mut variables = Vec::new();
        variables.push(self.parse_identifier("DELETE variable")?);
        while self.match_token(&TokenType::Comma) {
            variables.push(self.parse_identifier("DELETE variable")?);
        }
        Ok(DeleteClause { variables })
    }

    fn parse_projection_list(&mut self) -> Result<Vec<Projection>> {
        let mut items = Vec::new();
        loop {
            let expression = self.parse_expression()?;
            let alias = if self.match_token(&TokenType::As) {
                Some(self.parse_identifier("alias after AS")?)
            } else {
                None
            };
            items.push(Projection { expression, alias });
            if !self.match_token(&TokenType::Comma) {
                break;
            }
        }
        Ok(items)
    }

    fn parse_order_by(&mut self) -> Result<OrderByClause> {
        let mut items = Vec::new();
        loop {
            let expression = self.parse_expression()?;
            let direction = if self.match_token(&TokenType::Asc) {
                Direction::Ascending
            } else if self.match_token(&TokenType::Desc) {
                Direction::Descending
            } else {
                Direction::Ascending
            };
            items.push(OrderItem {
                expression,
                direction,
            });
            if !self.match_token(&TokenType::Comma) {
                break;
            }
        }
        Ok(OrderByClause { items })
    }

    fn parse_count(&mut self, ctx: &'static str) -> Result<u64> {
        let offset = self.peek().offset;
        match &self.advance().token_type {
            TokenType::Integer(n) if *n >= 0 => Ok(*n as u64),
            _ => Err(Error::Parse {
                offset,
                message: format!("expected non-negative integer after {ctx}"),
            }),
        }
    }

    fn parse_identifier(&mut self, ctx: &'static str) -> Result<String> {
        let offset = self.peek().offset;
        match &self.advance().token_type {
            TokenType::Identifier(name) => Ok(name.clone()),
            _ => Err(Error::Parse {
                offset,
                message: format!("expected identifier for {ctx}"),
            }),
        }
    }

    fn parse_expression(&mut self) -> Result<Expression> {
        self.parse_expression_bp(0)
    }

    fn parse_expression_bp(&mut self, min_bp: u8) -> Result<Expression> {
        let mut lhs = self.parse_prefix_expression()?;

        loop {
            let Some((op, lbp)) = self.peek_infix_operator() else {
                break;
            };
            if lbp < min_bp {
                break;
            }

            self.advance();
            if matches!(op, BinaryOperator::StartsWith | BinaryOperator::EndsWith) {
                self.consume(&TokenType::With, "expected WITH after STARTS/ENDS")?;
            }

            let rhs = self.parse_expression_bp(lbp + 1)?;
            lhs = Expression::Binary(Box::new(BinaryExpression {
                left: lhs,
                operator: op,
                right: rhs,
            }));
        }

        Ok(lhs)
    }

    fn parse_prefix_expression(&mut self) -> Result<Expression> {
        if self.match_token(&TokenType::Not) {
            let operand = self.parse_expression_bp(Self::BP_NOT)?;
            return Ok(Expression::Unary(Box::new(UnaryExpression {
                operator: UnaryOperator::Not,
                operand,
            })));
        }

        // The lexer shares `Dash` with pattern syntax; in expression context
        // it is unary negation or binary subtraction.
        if self.match_token(&TokenType::Dash) {
            let operand = self.parse_expression_bp(Self::BP_PREFIX)?;
            return Ok(Expression::Unary(Box::new(UnaryExpression {
                operator: UnaryOperator::Negate,
                operand,
            })));
        }

        // Unary plus is a no-op but still parses.
        if self.match_token(&TokenType::Plus) {
            return self.parse_expression_bp(Self::BP_PREFIX);
        }

        self.parse_primary_expression()
    }

    fn parse_primary_expression(&mut self) -> Result<Expression> {
        match &self.peek().token_type {
            TokenType::LeftParen => {
                self.advance();
                let expr = self.parse_expression_bp(0)?;
                self.consume(&TokenType::RightParen, "expected ')'")?;
                Ok(expr)
            }
            TokenType::Integer(n) => {
                let n = *n;
                self.advance();
                Ok(Expression::Literal(Literal::Integer(n)))
            }
            TokenType::Float(f) => {
                let f = *f;
                self.advance();
                Ok(Expression::Literal(Literal::Float(f)))
            }
            TokenType::String(s) => {
                let s = s.clone();
                self.advance();
                Ok(Expression::Literal(Literal::String(s)))
            }
            TokenType::Boolean(b) => {
                let b = *b;
                self.advance();
                Ok(Expression::Literal(Literal::Bool(b)))
            }
            TokenType::Null => {
                self.advance();
                Ok(Expression::Literal(Literal::Null))
            }
            TokenType::Parameter(name) => {
                let name = name.clone();
                self.advance();
                Ok(Expression::Parameter(name))
            }
            TokenType::LeftBracket => {
                self.advance();
                let mut items = Vec::new();
                if !self.check(&TokenType::RightBracket) {
                    items.push(self.parse_expression()?);
                    while self.match_token(&TokenType::Comma) {
                        items.push(self.parse_expression()?);
                    }
                }
                self.consume(&TokenType::RightBracket, "expected ']' after list")?;
                Ok(Expression::List(items))
            }
            TokenType::LeftBrace => Ok(Expression::Map(self.parse_property_map()?)),
            TokenType::Identifier(name) => {
                let name = name.clone();
                self.advance();

                if self.check(&TokenType::LeftParen) {
                    return self.parse_call(name);
                }

                if self.match_token(&TokenType::Dot) {
                    let key = self.parse_identifier("property name")?;
                    return Ok(Expression::PropertyAccess(PropertyAccess {
                        variable: name,
                        key,
                    }));
                }

                Ok(Expression::Variable(name))
            }
            _ => Err(self.error_here(format!(
                "expected expression, found {:?}",
                self.peek().token_type
            ))),
        }
    }

    /// Parses the argument list of `name(...)`. Aggregate names get their
    /// own AST node so the executor can spot grouping directly.
    fn parse_call(&mut self, name: String) -> Result<Expression> {
        self.consume(&TokenType::LeftParen, "expected '(' after function name")?;

        let aggregate = match name.to_uppercase().as_str() {
            "COUNT" => Some(AggregateFunction::Count),
            "SUM" => Some(AggregateFunction::Sum),
            "AVG" => Some(AggregateFunction::Avg),
            "MIN" => Some(AggregateFunction::Min),
            "MAX" => Some(AggregateFunction::Max),
            _ => None,
        };

        if let Some(function) = aggregate {
            if self.match_token(&TokenType::Asterisk) {
                self.consume(&TokenType::RightParen, "expected ')' after '*'")?;
                if function != AggregateFunction::Count {
                    return Err(self.error_here(format!(
                        "'*' is only valid inside COUNT, not {}",
                        function.name()
                    )));
                }
                return Ok(Expression::Aggregate(AggregateCall {
                    function,
                    argument: None,
                }));
            }
            let argument = self.parse_expression()?;
            self.consume(&TokenType::RightParen, "expected ')' after aggregate argument")?;
            return Ok(Expression::Aggregate(AggregateCall {
                function,
                argument: Some(Box::new(argument)),
            }));
        }

        let mut args = Vec::new();
        if !self.check(&TokenType::RightParen) {
            args.push(self.parse_expression()?);
            while self.match_token(&TokenType::Comma) {
                args.push(self.parse_expression()?);
            }
        }
        self.consume(&TokenType::RightParen, "expected ')' after function arguments")?;
        Ok(Expression::FunctionCall(FunctionCall { name, args }))
    }

    fn peek_infix_operator(&self) -> Option<(BinaryOperator, u8)> {
        match &self.peek().token_type {
            TokenType::Or => Some((BinaryOperator::Or, Self::BP_OR)),
            TokenType::And => Some((BinaryOperator::And, Self::BP_AND)),

            TokenType::Equals => Some((BinaryOperator::Equals, Self::BP_CMP)),
            TokenType::NotEquals => Some((BinaryOperator::NotEquals, Self::BP_CMP)),
            TokenType::LessThan => Some((BinaryOperator::LessThan, Self::BP_CMP)),
            TokenType::LessEqual => Some((BinaryOperator::LessEqual, Self::BP_CMP)),
            TokenType::GreaterThan => Some((BinaryOperator::GreaterThan, Self::BP_CMP)),
            TokenType::GreaterEqual => Some((BinaryOperator::GreaterEqual, Self::BP_CMP)),
            TokenType::Contains => Some((BinaryOperator::Contains, Self::BP_CMP)),
            TokenType::RegexMatch => Some((BinaryOperator::RegexMatch, Self::BP_CMP)),
            TokenType::Starts => Some((BinaryOperator::StartsWith, Self::BP_CMP)),
            TokenType::Ends => Some((BinaryOperator::EndsWith, Self::BP_CMP)),

            TokenType::Plus => Some((BinaryOperator::Add, Self::BP_ADD)),
            TokenType::Dash => Some((BinaryOperator::Subtract, Self::BP_ADD)),
            TokenType::Asterisk => Some((BinaryOperator::Multiply, Self::BP_MUL)),
            TokenType::Divide => Some((BinaryOperator::Divide, Self::BP_MUL)),
            _ => None,
        }
    }

    fn error_here(&self, message: String) -> Error {
        Error::Parse {
            offset: self.peek().offset,
            message,
        }
    }

    fn peek_is_identifier(&self) -> bool {
        matches!(self.peek().token_type, TokenType::Identifier(_))
    }

    fn match_token(&mut self, token_type: &TokenType) -> bool {
        if self.check(token_type) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn check(&self, token_type: &TokenType) -> bool {
        std::mem::discriminant(token_type) == std::mem::discriminant(&self.peek().token_type)
    }

    fn consume(&mut self, token_type: &TokenType, message: &str) -> Result<()> {
        if self.check(token_type) {
            self.advance();
            Ok(())
        } else {
            Err(self.error_here(message.to_string()))
        }
    }

    fn is_at_end(&self) -> bool {
        matches!(self.peek().token_type, TokenType::Eof)
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.position]
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.position += 1;
        }
        &self.tokens[self.position - 1]
    }
}
