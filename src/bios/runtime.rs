//! Runtime subroutines appended to every bare-metal translation.
//!
//! 16-bit real mode with 386 registers. Output goes straight into the
//! colour text buffer at `0xB800:0000` (ES is set up by the entry
//! prologue), input comes from the BIOS keyboard service `int 0x16`.
//!
//! Register contract:
//!   print_str  DS:SI = NUL-terminated string
//!   print_int  EAX   = signed 32-bit value
//!   scan       DS:DI = buffer, CX = max characters (terminated by NUL)
//!   atoi       DS:SI = decimal string, result in EAX
//!   copy_str   DS:SI = source, DS:DI = destination
//!   hang       never returns

/// Labels the bundle defines, in emission order.
pub const SUBROUTINES: [&str; 7] = [
    "print_str",
    "print_int",
    "next_line",
    "scan",
    "atoi",
    "copy_str",
    "hang",
];

pub const RUNTIME: &str = "\
; ===== Runtime Subroutines =====

print_str:
    push ax
    push si
    push di
    mov di, [cursor]
.next:
    lodsb
    test al, al
    jz .done
    mov ah, 0x07
    stosw
    jmp .next
.done:
    mov [cursor], di
    call next_line
    pop di
    pop si
    pop ax
    ret

print_int:
    pushad
    mov di, [cursor]
    test eax, eax
    jnz .nonzero
    mov ax, 0x0730
    stosw
    jmp .done
.nonzero:
    jns .positive
    neg eax
    push ax
    mov ax, 0x072D
    stosw
    pop ax
.positive:
    xor cx, cx
    mov ebx, 10
.divide:
    xor edx, edx
    div ebx
    push dx
    inc cx
    test eax, eax
    jnz .divide
.emit:
    pop ax
    add al, '0'
    mov ah, 0x07
    stosw
    loop .emit
.done:
    mov [cursor], di
    call next_line
    popad
    ret

next_line:
    push ax
    push bx
    push dx
    mov ax, [cursor]
    xor dx, dx
    mov bx, 160
    div bx
    inc ax
    cmp ax, 25
    jb .store
    xor ax, ax
.store:
    mul bx
    mov [cursor], ax
    pop dx
    pop bx
    pop ax
    ret

scan:
    push ax
    push bx
    push cx
    push di
    mov bx, [cursor]
.key:
    xor ah, ah
    int 0x16
    cmp al, 13
    je .finish
    jcxz .key
    mov [di], al
    inc di
    dec cx
    push di
    mov di, bx
    mov ah, 0x07
    stosw
    mov bx, di
    pop di
    jmp .key
.finish:
    mov byte [di], 0
    mov [cursor], bx
    call next_line
    pop di
    pop cx
    pop bx
    pop ax
    ret

atoi:
    push ebx
    push ecx
    push si
    xor eax, eax
    xor ecx, ecx
    cmp byte [si], '-'
    jne .digits
    inc cx
    inc si
.digits:
    movzx ebx, byte [si]
    sub bl, '0'
    cmp bl, 9
    ja .sign
    imul eax, eax, 10
    add eax, ebx
    inc si
    jmp .digits
.sign:
    jcxz .done
    neg eax
.done:
    pop si
    pop ecx
    pop ebx
    ret

copy_str:
    push ax
    push si
    push di
.copy:
    mov al, [si]
    mov [di], al
    inc si
    inc di
    test al, al
    jnz .copy
    pop di
    pop si
    pop ax
    ret

hang:
    cli
    hlt
    jmp hang
";
