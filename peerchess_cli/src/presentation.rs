use peerchess_lib::session::{ChatDirection, ChatLine, Presentation};

/// Prints the board and notices to stdout.
pub struct TerminalPresentation {
   /// Black's side of the board at the bottom.
   flipped: bool,
}

impl TerminalPresentation {
   pub fn new(flipped: bool) -> TerminalPresentation {
      TerminalPresentation { flipped }
   }
}

impl Presentation for TerminalPresentation {
   fn render(&mut self, fen: &str) {
      print!("{}", diagram(fen, self.flipped));
   }

   fn set_status_text(&mut self, text: &str) {
      println!("{}", text);
   }

   fn set_connection_status(&mut self, text: &str) {
      println!("[{}]", text);
   }

   fn show_chat(&mut self, line: &ChatLine) {
      match line.direction {
         ChatDirection::Sent => println!("you> {}", line.text),
         ChatDirection::Received => println!("friend> {}", line.text),
      }
   }
}

/// Draws the placement field of `fen`, uppercase for White.
pub fn diagram(fen: &str, flipped: bool) -> String {
   let mut grid = [['.'; 8]; 8];
   let placement = fen.split_whitespace().next().unwrap_or("");
   for (row, rank) in placement.split('/').take(8).enumerate() {
      let mut file = 0;
      for c in rank.chars() {
         match c.to_digit(10) {
            Some(empty) => file += empty as usize,
            None => {
               if file < 8 {
                  grid[row][file] = c;
               }
               file += 1;
            }
         }
      }
   }

   let order: Vec<usize> = if flipped { (0..8).rev().collect() } else { (0..8).collect() };
   let mut out = String::new();
   for &row in &order {
      out.push_str(&format!("{} ", 8 - row));
      for &file in &order {
         out.push(' ');
         out.push(grid[row][file]);
      }
      out.push('\n');
   }
   out.push_str("  ");
   for &file in &order {
      out.push(' ');
      out.push((b'a' + file as u8) as char);
   }
   out.push('\n');
   out
}
