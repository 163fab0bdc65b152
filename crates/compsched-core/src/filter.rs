use anyhow::anyhow;
use tracing::trace;

use crate::timetable::ScheduledActivity;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pred {
  EventEq(String),
  RoundEq(u32),
  GroupEq(u32),
  RoomContains(String),
  VenueContains(String),
  DayContains(String),
  TextContains(String)
}

#[derive(Debug, Clone)]
enum Expr {
  True,
  Pred(Pred),
  And(Vec<Expr>),
  Or(Vec<Expr>)
}

#[derive(Debug, Clone)]
pub struct Filter {
  expr: Expr
}

impl Default for Filter {
  fn default() -> Self {
    Self {
      expr: Expr::True
    }
  }
}

impl Filter {
  #[tracing::instrument]
  pub fn parse(
    terms: &[String]
  ) -> anyhow::Result<Self> {
    if terms.is_empty() {
      return Ok(Self::default());
    }

    let tokens = lex_terms(terms);
    let mut parser =
      Parser::new(tokens);
    let expr = parser.parse_expr()?;
    parser.ensure_end()?;

    Ok(Self {
      expr
    })
  }

  pub fn is_empty(&self) -> bool {
    matches!(self.expr, Expr::True)
  }

  pub fn matches(
    &self,
    activity: &ScheduledActivity
  ) -> bool {
    eval_expr(&self.expr, activity)
  }
}

struct Parser {
  tokens: Vec<String>,
  pos:    usize
}

impl Parser {
  fn new(tokens: Vec<String>) -> Self {
    Self {
      tokens,
      pos: 0
    }
  }

  fn parse_expr(
    &mut self
  ) -> anyhow::Result<Expr> {
    self.parse_or()
  }

  fn parse_or(
    &mut self
  ) -> anyhow::Result<Expr> {
    let mut nodes =
      vec![self.parse_and()?];

    while self.match_any(&["or", "||"])
    {
      nodes.push(self.parse_and()?);
    }

    if nodes.len() == 1 {
      Ok(nodes.remove(0))
    } else {
      Ok(Expr::Or(nodes))
    }
  }

  fn parse_and(
    &mut self
  ) -> anyhow::Result<Expr> {
    let mut nodes =
      vec![self.parse_primary()?];

    loop {
      if self.match_any(&["and", "&&"])
      {
        nodes
          .push(self.parse_primary()?);
        continue;
      }

      if self
        .peek_is_implicit_and_boundary()
      {
        nodes
          .push(self.parse_primary()?);
        continue;
      }

      break;
    }

    if nodes.len() == 1 {
      Ok(nodes.remove(0))
    } else {
      Ok(Expr::And(nodes))
    }
  }

  fn parse_primary(
    &mut self
  ) -> anyhow::Result<Expr> {
    if self.match_token("(") {
      let inner = self.parse_expr()?;
      self.expect_token(")")?;
      return Ok(inner);
    }

    let token =
      self.next_token().ok_or_else(
        || {
          anyhow!(
            "unexpected end of filter \
             expression"
          )
        }
      )?;

    if token == ")" {
      return Err(anyhow!(
        "unexpected ')' in filter \
         expression"
      ));
    }

    Ok(Expr::Pred(parse_atom(&token)?))
  }

  fn ensure_end(
    &self
  ) -> anyhow::Result<()> {
    if self.pos < self.tokens.len() {
      Err(anyhow!(
        "unexpected token in filter \
         expression: {}",
        self.tokens[self.pos]
      ))
    } else {
      Ok(())
    }
  }

  fn match_token(
    &mut self,
    expected: &str
  ) -> bool {
    let Some(tok) =
      self.tokens.get(self.pos)
    else {
      return false;
    };
    if tok
      .eq_ignore_ascii_case(expected)
    {
      self.pos += 1;
      true
    } else {
      false
    }
  }

  fn match_any(
    &mut self,
    options: &[&str]
  ) -> bool {
    options
      .iter()
      .any(|opt| self.match_token(opt))
  }

  fn expect_token(
    &mut self,
    expected: &str
  ) -> anyhow::Result<()> {
    if self.match_token(expected) {
      Ok(())
    } else {
      Err(anyhow!(
        "expected '{expected}' in \
         filter expression"
      ))
    }
  }

  fn next_token(
    &mut self
  ) -> Option<String> {
    let out = self
      .tokens
      .get(self.pos)
      .cloned();
    if out.is_some() {
      self.pos += 1;
    }
    out
  }

  fn peek_is_implicit_and_boundary(
    &self
  ) -> bool {
    let Some(tok) =
      self.tokens.get(self.pos)
    else {
      return false;
    };

    !(tok == ")"
      || ["and", "&&", "or", "||"]
        .iter()
        .any(|kw| {
          tok.eq_ignore_ascii_case(kw)
        }))
  }
}

fn lex_terms(
  terms: &[String]
) -> Vec<String> {
  let mut out = Vec::new();
  for term in terms {
    for word in term.split_whitespace()
    {
      let mut current = String::new();
      for ch in word.chars() {
        if ch == '(' || ch == ')' {
          if !current.is_empty() {
            out.push(std::mem::take(
              &mut current
            ));
          }
          out.push(ch.to_string());
        } else {
          current.push(ch);
        }
      }
      if !current.is_empty() {
        out.push(current);
      }
    }
  }
  trace!(?out, "lexed filter terms");
  out
}

fn parse_atom(
  token: &str
) -> anyhow::Result<Pred> {
  let Some((key, value)) =
    token.split_once(':')
  else {
    return Ok(Pred::TextContains(
      token.to_ascii_lowercase()
    ));
  };

  let value = value.trim();
  if value.is_empty() {
    return Err(anyhow!(
      "filter term {token} has no \
       value"
    ));
  }

  match key.to_ascii_lowercase().as_str()
  {
    | "event" => {
      Ok(Pred::EventEq(
        value.to_ascii_lowercase()
      ))
    }
    | "round" => {
      Ok(Pred::RoundEq(
        parse_number(key, value)?
      ))
    }
    | "group" => {
      Ok(Pred::GroupEq(
        parse_number(key, value)?
      ))
    }
    | "room" => {
      Ok(Pred::RoomContains(
        value.to_ascii_lowercase()
      ))
    }
    | "venue" => {
      Ok(Pred::VenueContains(
        value.to_ascii_lowercase()
      ))
    }
    | "day" => {
      Ok(Pred::DayContains(
        value.to_ascii_lowercase()
      ))
    }
    | other => {
      Err(anyhow!(
        "unknown filter attribute: \
         {other}"
      ))
    }
  }
}

fn parse_number(
  key: &str,
  value: &str
) -> anyhow::Result<u32> {
  value.parse::<u32>().map_err(|err| {
    anyhow!(
      "invalid {key} number {value}: \
       {err}"
    )
  })
}

fn eval_expr(
  expr: &Expr,
  activity: &ScheduledActivity
) -> bool {
  match expr {
    | Expr::True => true,
    | Expr::Pred(pred) => {
      eval_pred(pred, activity)
    }
    | Expr::And(nodes) => {
      nodes.iter().all(|node| {
        eval_expr(node, activity)
      })
    }
    | Expr::Or(nodes) => {
      nodes.iter().any(|node| {
        eval_expr(node, activity)
      })
    }
  }
}

fn contains_ci(
  haystack: &str,
  needle: &str
) -> bool {
  haystack
    .to_ascii_lowercase()
    .contains(needle)
}

fn eval_pred(
  pred: &Pred,
  activity: &ScheduledActivity
) -> bool {
  let code = activity.code.as_ref();
  match pred {
    | Pred::EventEq(event) => {
      code
        .and_then(|c| c.event_id())
        .is_some_and(|id| id == event.as_str())
    }
    | Pred::RoundEq(round) => {
      code.and_then(|c| c.round())
        == Some(*round)
    }
    | Pred::GroupEq(group) => {
      code.and_then(|c| c.group())
        == Some(*group)
    }
    | Pred::RoomContains(needle) => {
      activity.room.as_ref().is_some_and(
        |room| {
          contains_ci(&room.name, needle)
        }
      )
    }
    | Pred::VenueContains(needle) => {
      activity.venue.as_deref().is_some_and(
        |venue| {
          contains_ci(venue, needle)
        }
      )
    }
    | Pred::DayContains(needle) => {
      contains_ci(&activity.day, needle)
    }
    | Pred::TextContains(needle) => {
      contains_ci(
        &activity.name,
        needle
      )
    }
  }
}
