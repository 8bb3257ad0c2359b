use std::sync::Arc;

use teloxide::{
  prelude::*,
  utils::{command::BotCommands, html},
};

use super::ReplyBot;
use crate::{
  entity::{Game, UserRole, transaction},
  prelude::*,
  state::{AppState, Services},
  sv::{Actor, broadcast::AudienceFilter, plan::PlanUpdate},
};

#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "lowercase")]
pub enum Command {
  Start,
  Help,
  Pending,
  Verify(String),
  Fail(String),
  User(String),
  SetRole(String),
  Suspend(String),
  Unsuspend(String),
  Grant(String),
  Plans,
  SetPrice(String),
  Broadcast(String),
  Stats,
}

const ADMIN_HELP: &str = "\
<b>📋 Admin Commands</b>

<b>Payments:</b>
/pending - List pending transactions
/verify &lt;tx_id&gt; - Approve a payment
/fail &lt;tx_id&gt; &lt;reason&gt; - Reject a payment

<b>Users:</b>
/user &lt;user_id&gt; - Show user details
/setrole &lt;user_id&gt; &lt;user|assistant|admin|super_admin&gt;
/suspend &lt;user_id&gt; - Block an account
/unsuspend &lt;user_id&gt; - Unblock an account
/grant &lt;user_id&gt; &lt;game&gt; &lt;rounds&gt; - Issue a free license

<b>Catalog:</b>
/plans - List all plans
/setprice &lt;plan_id&gt; &lt;amount&gt; - Change a plan price (e.g. 19.99)

<b>System:</b>
/broadcast &lt;title&gt; | &lt;message&gt; - Notify every active user
/stats - Dashboard
/help - Show this message";

fn usage(text: &str) -> Error {
  Error::InvalidArgs(format!("Usage: {text}"))
}

fn parse_id<T: std::str::FromStr>(raw: &str, what: &str) -> Result<T> {
  raw.trim().parse().map_err(|_| Error::InvalidArgs(format!("Invalid {what}")))
}

fn parse_fail(args: &str) -> Result<(i32, String)> {
  let (id, reason) = args
    .trim()
    .split_once(' ')
    .ok_or_else(|| usage("/fail <tx_id> <reason>"))?;
  let reason = reason.trim();
  if reason.is_empty() {
    return Err(usage("/fail <tx_id> <reason>"));
  }
  Ok((parse_id(id, "transaction ID")?, reason.to_string()))
}

fn parse_role(args: &str) -> Result<(i64, UserRole)> {
  match args.split_whitespace().collect::<Vec<_>>().as_slice() {
    [id, role] => Ok((
      parse_id(id, "user ID")?,
      role.parse().map_err(Error::InvalidArgs)?,
    )),
    _ => Err(usage("/setrole <user_id> <role>")),
  }
}

fn parse_grant(args: &str) -> Result<(i64, Game, i32)> {
  match args.split_whitespace().collect::<Vec<_>>().as_slice() {
    [id, game, rounds] => Ok((
      parse_id(id, "user ID")?,
      game.parse().map_err(Error::InvalidArgs)?,
      parse_id(rounds, "round count")?,
    )),
    _ => Err(usage("/grant <user_id> <game> <rounds>")),
  }
}

fn parse_price(args: &str) -> Result<(i32, i64)> {
  match args.split_whitespace().collect::<Vec<_>>().as_slice() {
    [id, amount] => Ok((
      parse_id(id, "plan ID")?,
      utils::parse_money(amount)
        .ok_or_else(|| Error::InvalidArgs("Invalid amount".into()))?,
    )),
    _ => Err(usage("/setprice <plan_id> <amount>")),
  }
}

fn parse_broadcast(args: &str) -> Result<(String, String)> {
  let (title, body) = args
    .split_once('|')
    .ok_or_else(|| usage("/broadcast <title> | <message>"))?;
  Ok((title.trim().to_string(), body.trim().to_string()))
}

fn describe(tx: &transaction::Model) -> String {
  format!(
    "#{} <b>{:?}</b> {} by <code>{}</code>\n   {} / <code>{}</code> ({})",
    tx.id,
    tx.tx_type,
    utils::format_money(tx.amount.abs()),
    tx.user_id,
    html::escape(tx.method.as_deref().unwrap_or("-")),
    html::escape(tx.reference.as_deref().unwrap_or("-")),
    utils::format_date(tx.created_at),
  )
}

pub async fn handle(
  app: Arc<AppState>,
  bot: ReplyBot,
  cmd: Command,
) -> ResponseResult<()> {
  if !app.admins.contains(&bot.user_id) {
    if cmd == Command::Start {
      bot
        .reply_html(
          "<b>PredictPro</b>\n\nThis bot is for staff only. \
           Use the web app to manage your account.",
        )
        .await?;
    }
    return Ok(());
  }

  let actor = Actor::Telegram(bot.chat_id.0);
  let sv = app.sv();

  let text = match run(&sv, actor, cmd).await {
    Ok(text) => text,
    Err(err) => {
      warn!("Admin command from {} failed: {}", bot.user_id, err);
      format!("❌ {}", html::escape(&err.user_message()))
    }
  };

  bot.reply_html_chunked(text).await?;
  Ok(())
}

async fn run(sv: &Services<'_>, actor: Actor, cmd: Command) -> Result<String> {
  match cmd {
    Command::Start | Command::Help => Ok(ADMIN_HELP.into()),

    Command::Pending => {
      let page = sv.payment.pending(None, None).await?;
      if page.items.is_empty() {
        return Ok("📭 No pending transactions.".into());
      }
      let mut text = String::from("<b>⏳ Pending transactions</b>\n\n");
      for tx in &page.items {
        text.push_str(&describe(tx));
        text.push('\n');
      }
      if page.next_cursor.is_some() {
        text.push_str("\n<i>More in the web panel</i>");
      }
      Ok(text)
    }

    Command::Verify(args) => {
      let id = parse_id(&args, "transaction ID")?;
      let tx = sv.payment.verify(actor, id).await?;
      Ok(format!("✅ Verified\n{}", describe(&tx)))
    }

    Command::Fail(args) => {
      let (id, reason) = parse_fail(&args)?;
      let tx = sv.payment.fail(actor, id, &reason).await?;
      Ok(format!("🚫 Failed: {}\n{}", html::escape(&reason), describe(&tx)))
    }

    Command::User(args) => {
      let id = parse_id(&args, "user ID")?;
      let (user, licenses) = sv.user.with_licenses(id).await?;
      let mut text = format!(
        "👤 <b>{}</b> (<code>{}</code>)\n\
         Email: {}\n\
         Role: {:?}{}\n\
         Balance: {}\n\
         Referral: <code>{}</code> ({}%, {} sales, {} earned)\n\
         Registered: {}\n\n\
         🔑 <b>Licenses ({})</b>\n",
        html::escape(&user.display_name),
        user.id,
        html::escape(&user.email),
        user.role,
        if user.is_suspended { " ⛔ suspended" } else { "" },
        utils::format_money(user.balance),
        user.referral_code,
        user.commission_rate,
        user.referral_sales,
        utils::format_money(user.referral_earnings),
        utils::format_date(user.created_at),
        licenses.len(),
      );
      for license in &licenses {
        let icon = if license.is_usable() {
          "🟢"
        } else if !license.payment_verified {
          "⏳"
        } else {
          "⚪"
        };
        text.push_str(&format!(
          "{} {} {}/{} <code>{}</code>\n",
          icon,
          license.game,
          license.rounds_remaining,
          license.rounds_total,
          license.key
        ));
      }
      Ok(text)
    }

    Command::SetRole(args) => {
      let (id, role) = parse_role(&args)?;
      let user = sv.user.set_role(actor, id, role).await?;
      Ok(format!("✅ User {} role set to {:?}", user.id, user.role))
    }

    Command::Suspend(args) => {
      let id = parse_id(&args, "user ID")?;
      let user = sv.user.set_suspended(actor, id, true).await?;
      Ok(format!("⛔ User {} suspended", user.id))
    }

    Command::Unsuspend(args) => {
      let id = parse_id(&args, "user ID")?;
      let user = sv.user.set_suspended(actor, id, false).await?;
      Ok(format!("✅ User {} unsuspended", user.id))
    }

    Command::Grant(args) => {
      let (id, game, rounds) = parse_grant(&args)?;
      let license = sv.license.grant(actor, id, game, rounds).await?;
      Ok(format!(
        "✅ Granted {} rounds of {} to {}\n<code>{}</code>",
        rounds, game, id, license.key
      ))
    }

    Command::Plans => {
      let plans = sv.plan.list(None, true).await?;
      let mut text = String::from("<b>📦 Plans</b>\n");
      for plan in plans {
        text.push_str(&format!(
          "\n{} <code>{}</code> {} {}: {} rounds for {}",
          if plan.is_active { "✅" } else { "❌" },
          plan.id,
          plan.game,
          html::escape(&plan.name),
          plan.rounds,
          utils::format_money(plan.price),
        ));
      }
      Ok(text)
    }

    Command::SetPrice(args) => {
      let (id, price) = parse_price(&args)?;
      let update = PlanUpdate { price: Some(price), ..Default::default() };
      let plan = sv.plan.update(actor, id, update).await?;
      Ok(format!(
        "✅ {} {} now costs {}",
        plan.game,
        html::escape(&plan.name),
        utils::format_money(plan.price)
      ))
    }

    Command::Broadcast(args) => {
      let (title, body) = parse_broadcast(&args)?;
      let broadcast = sv
        .broadcast
        .send(actor, &title, &body, AudienceFilter::default())
        .await?;
      Ok(format!("📣 Broadcast sent to {} users", broadcast.recipients))
    }

    Command::Stats => Ok(sv.stats.dashboard().await?.to_html()),
  }
}
